//! Deployment: image pulls, build, startup and readiness polling

pub mod driver;
pub mod readiness;
