//! Distribution-specific remediations

pub mod build_env;
pub mod selinux;
