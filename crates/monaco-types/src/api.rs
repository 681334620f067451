//! Catalog of known classic configuration APIs
//!
//! Classic endpoints carry per-API identity semantics the dialect adapter
//! needs: whether display names are unique, and whether the API holds a
//! single tenant-wide configuration object.

/// A known classic configuration API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicEndpoint {
    /// Name used in configuration files
    pub name: &'static str,
    /// URL path below `/api/config/v1`
    pub path: &'static str,
    /// Multiple objects may share a display name; identity is controlled
    /// through deterministic object UUIDs
    pub non_unique_name: bool,
    /// The API holds exactly one configuration object; upserts bypass the
    /// name lookup and PUT the singleton directly
    pub single_configuration: bool,
}

const KNOWN_APIS: &[ClassicEndpoint] = &[
    ClassicEndpoint {
        name: "alerting-profile",
        path: "alertingProfiles",
        non_unique_name: true,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "management-zone",
        path: "managementZones",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "auto-tag",
        path: "autoTags",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "dashboard",
        path: "dashboards",
        non_unique_name: true,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "notification",
        path: "notifications",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "maintenance-window",
        path: "maintenanceWindows",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "request-naming-service",
        path: "service/requestNaming",
        non_unique_name: true,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "app-detection-rule",
        path: "applicationDetectionRules",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "calculated-metrics-service",
        path: "calculatedMetrics/service",
        non_unique_name: false,
        single_configuration: false,
    },
    ClassicEndpoint {
        name: "frequent-issue-detection",
        path: "frequentIssueDetection",
        non_unique_name: false,
        single_configuration: true,
    },
    ClassicEndpoint {
        name: "data-privacy",
        path: "dataPrivacy",
        non_unique_name: false,
        single_configuration: true,
    },
    ClassicEndpoint {
        name: "hosts-auto-update",
        path: "hosts/autoupdate",
        non_unique_name: false,
        single_configuration: true,
    },
];

/// All known classic APIs.
pub fn known_apis() -> &'static [ClassicEndpoint] {
    KNOWN_APIS
}

/// Look up a classic API by its configuration-file name.
pub fn lookup(name: &str) -> Option<&'static ClassicEndpoint> {
    KNOWN_APIS.iter().find(|a| a.name == name)
}
