//! Application wiring: options, pipeline, diagnostics

pub mod diagnostic;
pub mod options;
pub mod run;
