//! The loaded manifest model
//!
//! Everything here is fully resolved: environment variables referenced by the
//! manifest have been read, URLs are trimmed, grouping projects are expanded.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A loaded manifest: projects plus the selected environments.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Project definitions by name
    pub projects: BTreeMap<String, ProjectDefinition>,
    /// Environment definitions by name, restricted to the requested
    /// environment/group filters
    pub environments: BTreeMap<String, EnvironmentDefinition>,
}

impl Manifest {
    /// Names of all selected environments
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }
}

/// One project to load configurations from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDefinition {
    pub name: String,
    /// Parent name for children of a grouping project
    pub group: Option<String>,
    /// Path relative to the manifest's directory
    pub path: PathBuf,
}

/// How a URL value was specified in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Direct value
    Value,
    /// Read from an environment variable at load time
    Environment,
}

/// A resolved URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlDefinition {
    pub kind: UrlKind,
    /// Resolved value, trailing `/` trimmed
    pub value: String,
    /// Name of the environment variable the value came from
    pub env_var: Option<String>,
}

/// A secret resolved from an environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSecret {
    /// Environment variable name
    pub name: String,
    /// Resolved value
    pub value: String,
}

/// OAuth2 client-credentials for platform APIs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: AuthSecret,
    pub client_secret: AuthSecret,
    /// Custom token endpoint; the client falls back to the default SSO
    /// endpoint when unset
    pub token_endpoint: Option<UrlDefinition>,
}

/// Authentication for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    /// API token for classic and settings APIs
    pub token: AuthSecret,
    /// OAuth credentials for platform APIs
    pub oauth: Option<OAuthCredentials>,
}

/// One tenant environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDefinition {
    pub name: String,
    pub url: UrlDefinition,
    pub auth: Auth,
    /// Environment group the environment is declared under
    pub group: String,
}

impl EnvironmentDefinition {
    /// Platform environments carry OAuth credentials and may deploy
    /// automation and bucket configurations.
    pub fn is_platform(&self) -> bool {
        self.auth.oauth.is_some()
    }
}
