//! monaco-manifest - Manifest and project file loading
//!
//! The manifest names the projects to deploy and the tenant environments to
//! deploy them to. Each project path holds a tree of YAML files declaring
//! configurations. This crate turns both into the immutable model of
//! `monaco-types`, resolving manifest-level environment variables eagerly so
//! missing credentials surface before any deploy starts.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod manifest;
pub mod project;

pub use errors::{ManifestError, ProjectError};
pub use loader::{load_manifest, LoaderContext};
pub use manifest::{
    Auth, AuthSecret, EnvironmentDefinition, Manifest, OAuthCredentials, ProjectDefinition,
    UrlDefinition, UrlKind,
};
pub use project::{load_projects, Project};
