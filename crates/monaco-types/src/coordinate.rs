//! Configuration coordinates
//!
//! A [Coordinate] uniquely identifies a configuration within a loaded set.
//! Its canonical string form is `project:type:configId` and its ordering is
//! lexicographic over the three components, which the orchestrator relies on
//! as a deterministic tie-breaker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a single configuration: `(project, type, configId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    /// Project the configuration belongs to
    pub project: String,
    /// Type identifier (classic api name, settings schema id, automation resource, ...)
    #[serde(rename = "type")]
    pub config_type: String,
    /// Configuration id, unique within `(project, type)`
    pub config_id: String,
}

impl Coordinate {
    /// Create a new coordinate
    pub fn new(
        project: impl Into<String>,
        config_type: impl Into<String>,
        config_id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            config_type: config_type.into(),
            config_id: config_id.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.config_type, self.config_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_canonical_triple() {
        let c = Coordinate::new("infra", "alerting-profile", "main");
        assert_eq!(c.to_string(), "infra:alerting-profile:main");
    }

    #[test]
    fn test_ordering_is_lexicographic_per_component() {
        let a = Coordinate::new("a", "z", "z");
        let b = Coordinate::new("b", "a", "a");
        assert!(a < b);

        let c = Coordinate::new("p", "t", "1");
        let d = Coordinate::new("p", "t", "2");
        assert!(c < d);
    }
}
