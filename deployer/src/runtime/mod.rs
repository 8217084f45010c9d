//! Container runtime installation: engine and compose tool

pub mod compose;
pub mod engine;
