//! Loaded configurations and their type tags

use crate::coordinate::Coordinate;
use crate::parameter::{Parameter, ParameterReference};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the mandatory display-name parameter of classic configurations.
pub const NAME_PARAMETER: &str = "name";
/// Name of the scope parameter required by settings configurations.
pub const SCOPE_PARAMETER: &str = "scope";
/// Property under which every deployed entity publishes its server id.
pub const ID_PROPERTY: &str = "id";

/// Resources of the platform automation API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationResource {
    Workflow,
    BusinessCalendar,
    SchedulingRule,
}

impl AutomationResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationResource::Workflow => "workflow",
            AutomationResource::BusinessCalendar => "business-calendar",
            AutomationResource::SchedulingRule => "scheduling-rule",
        }
    }
}

impl fmt::Display for AutomationResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API dialect of a configuration. The deploy adapter is selected by matching
/// on this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigType {
    /// Classic config API (`/api/config/v1/<api>`)
    Classic { api: String },
    /// Settings 2.0 object (`/api/v2/settings/objects`)
    Settings {
        schema_id: String,
        schema_version: Option<String>,
    },
    /// Platform automation resource
    Automation { resource: AutomationResource },
    /// Grail storage bucket definition
    Bucket,
}

impl ConfigType {
    /// The string used as the coordinate's type component.
    pub fn type_name(&self) -> &str {
        match self {
            ConfigType::Classic { api } => api,
            ConfigType::Settings { schema_id, .. } => schema_id,
            ConfigType::Automation { resource } => resource.as_str(),
            ConfigType::Bucket => "bucket",
        }
    }

    /// Platform-only types require OAuth credentials on the target
    /// environment and are rejected on token-only environments.
    pub fn is_platform_only(&self) -> bool {
        matches!(self, ConfigType::Automation { .. } | ConfigType::Bucket)
    }
}

/// One loaded configuration. Immutable after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub coordinate: Coordinate,
    pub config_type: ConfigType,
    pub template: Template,
    /// All parameters, including the reserved `name` and `scope` entries
    pub parameters: BTreeMap<String, Parameter>,
    /// Skipped configurations are resolved but never deployed
    pub skip: bool,
    /// User-pinned server-side object id, preferred over identity lookups
    pub origin_object_id: Option<String>,
    pub environment: String,
    pub group: String,
}

impl Config {
    /// Every reference declared by any parameter of this configuration,
    /// including references to sibling parameters (same coordinate).
    pub fn references(&self) -> Vec<ParameterReference> {
        self.parameters
            .values()
            .flat_map(|p| p.references(&self.coordinate))
            .collect()
    }

    /// References pointing at other configurations only.
    pub fn cross_config_references(&self) -> Vec<ParameterReference> {
        self.references()
            .into_iter()
            .filter(|r| r.config != self.coordinate)
            .collect()
    }

    pub fn is_platform_only(&self) -> bool {
        self.config_type.is_platform_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn config_with(parameters: BTreeMap<String, Parameter>) -> Config {
        Config {
            coordinate: Coordinate::new("p", "alerting-profile", "c"),
            config_type: ConfigType::Classic {
                api: "alerting-profile".into(),
            },
            template: Template::new("t.json", "{}"),
            parameters,
            skip: false,
            origin_object_id: None,
            environment: "dev".into(),
            group: "default".into(),
        }
    }

    #[test]
    fn test_cross_config_references_exclude_siblings() {
        let own = Coordinate::new("p", "alerting-profile", "c");
        let other = Coordinate::new("p", "management-zone", "zone");
        let params = BTreeMap::from([
            (
                "zoneId".to_string(),
                Parameter::Reference(crate::parameter::ParameterReference {
                    config: other.clone(),
                    property: "id".into(),
                }),
            ),
            (
                "greeting".to_string(),
                Parameter::Compound {
                    format: "hi {{.name}}".into(),
                    references: vec!["name".into()],
                },
            ),
            ("name".to_string(), Parameter::Value(Value::String("n".into()))),
        ]);

        let cfg = config_with(params);
        assert_eq!(cfg.references().len(), 2);

        let cross = cfg.cross_config_references();
        assert_eq!(cross.len(), 1);
        assert_eq!(cross[0].config, other);
        assert!(cfg.references().iter().any(|r| r.config == own));
    }

    #[test]
    fn test_platform_only_types() {
        assert!(ConfigType::Bucket.is_platform_only());
        assert!(ConfigType::Automation {
            resource: AutomationResource::Workflow
        }
        .is_platform_only());
        assert!(!ConfigType::Classic { api: "dashboard".into() }.is_platform_only());
        assert!(!ConfigType::Settings {
            schema_id: "builtin:tags".into(),
            schema_version: None
        }
        .is_platform_only());
    }

    #[test]
    fn test_automation_resource_kebab_case() {
        let r: AutomationResource = serde_yaml::from_str("business-calendar").unwrap();
        assert_eq!(r, AutomationResource::BusinessCalendar);
        assert_eq!(r.to_string(), "business-calendar");
    }
}
