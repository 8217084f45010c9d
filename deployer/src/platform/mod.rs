//! Platform detection

pub mod os_release;
pub mod profile;
