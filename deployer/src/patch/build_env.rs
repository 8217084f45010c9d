//! Build engine selection for the deployment driver

use crate::platform::profile::PlatformProfile;

/// Environment exported to every compose `build` and `up`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: Vec<(String, String)>,
}

impl BuildEnv {
    /// Forces the legacy builder on platforms whose BuildKit is broken
    pub fn for_profile(profile: &PlatformProfile) -> Self {
        if !profile.build_engine_broken() {
            return Self::default();
        }
        Self {
            vars: vec![
                ("DOCKER_BUILDKIT".to_string(), "0".to_string()),
                ("COMPOSE_DOCKER_CLI_BUILD".to_string(), "0".to_string()),
            ],
        }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn is_legacy(&self) -> bool {
        !self.vars.is_empty()
    }
}
