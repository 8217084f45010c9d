//! MediCare AI deployer library
//!
//! Takes a bare Linux host to a running, health-checked container stack:
//! platform detection, interactive configuration, runtime installation,
//! platform patches, configuration files, startup and readiness polling.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod gate;
pub mod logs;
pub mod materialize;
pub mod patch;
pub mod platform;
pub mod report;
pub mod runtime;
pub mod storage;
pub mod system;
pub mod utils;
