//! Deployment configuration: model, interactive collection, secrets

pub mod collector;
pub mod model;
pub mod network;
pub mod secrets;
