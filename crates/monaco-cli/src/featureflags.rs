//! Feature flags
//!
//! Opt-in switches read from `MONACO_FEAT_*` environment variables. Flags are
//! evaluated once at startup and snapshotted into the deploy options; nothing
//! re-reads them mid-run.

use tracing::warn;

/// A switch backed by an environment variable with a default
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlag {
    env_name: &'static str,
    default_enabled: bool,
}

impl FeatureFlag {
    pub const fn new(env_name: &'static str, default_enabled: bool) -> Self {
        Self {
            env_name,
            default_enabled,
        }
    }

    /// Evaluate the flag. `1`, `t`, `true` (any case) enable it; `0`, `f`,
    /// `false` disable it; anything else falls back to the default with a
    /// warning.
    pub fn enabled(&self) -> bool {
        let Ok(value) = std::env::var(self.env_name) else {
            return self.default_enabled;
        };
        match value.to_lowercase().as_str() {
            "1" | "t" | "true" => true,
            "0" | "f" | "false" => false,
            other => {
                warn!(
                    flag = self.env_name,
                    value = other,
                    default = self.default_enabled,
                    "Unsupported feature flag value, using default"
                );
                self.default_enabled
            }
        }
    }
}

/// Gate intra-component parallel execution of the dependency graph.
pub fn graph_deploy_parallel() -> FeatureFlag {
    FeatureFlag::new("MONACO_FEAT_GRAPH_DEPLOY_PARALLEL", false)
}

/// Keep coordinate UUID generation identical on every platform. Off restores
/// the historic host-separator behavior.
pub fn consistent_uuid_generation() -> FeatureFlag {
    FeatureFlag::new("MONACO_FEAT_CONSISTENT_UUID_GENERATION", true)
}

/// Recognize and rewrite settings objects tagged with legacy external ids.
pub fn legacy_external_id_migration() -> FeatureFlag {
    FeatureFlag::new("MONACO_FEAT_LEGACY_EXTERNAL_ID_MIGRATION", true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_flag_uses_default() {
        let flag = FeatureFlag::new("MONACO_TEST_FLAG_UNSET", true);
        assert!(flag.enabled());
        let flag = FeatureFlag::new("MONACO_TEST_FLAG_UNSET", false);
        assert!(!flag.enabled());
    }

    #[test]
    fn test_truthy_and_falsy_values() {
        std::env::set_var("MONACO_TEST_FLAG_A", "TRUE");
        assert!(FeatureFlag::new("MONACO_TEST_FLAG_A", false).enabled());

        std::env::set_var("MONACO_TEST_FLAG_B", "0");
        assert!(!FeatureFlag::new("MONACO_TEST_FLAG_B", true).enabled());
    }

    #[test]
    fn test_garbage_value_falls_back_to_default() {
        std::env::set_var("MONACO_TEST_FLAG_C", "maybe");
        assert!(FeatureFlag::new("MONACO_TEST_FLAG_C", true).enabled());
        assert!(!FeatureFlag::new("MONACO_TEST_FLAG_C", false).enabled());
    }
}
