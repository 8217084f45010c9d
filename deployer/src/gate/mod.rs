//! Checks run before anything on the host is changed

pub mod privilege;
pub mod requirements;
