//! On-disk layout and installer settings

pub mod layout;
pub mod settings;
