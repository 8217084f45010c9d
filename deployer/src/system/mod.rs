//! Host interaction seams: subprocesses, terminal prompts, HTTP

pub mod command;
pub mod http;
pub mod prompt;
