//! monaco-types - Core configuration model for the monaco deployment engine
//!
//! This crate holds everything the rest of the engine agrees on:
//!
//! - **Coordinate**: the `(project, type, configId)` identity of a configuration
//! - **Config / ConfigType**: the immutable, loaded form of one configuration
//! - **Parameter**: the polymorphic value system behind `{references, resolve}`
//! - **Template**: payload text blobs with `{{.key}}` placeholder substitution
//! - **ids**: deterministic external IDs and object UUIDs written to the server
//! - **EntityMap**: the per-environment store of deploy results
//!
//! ## Architectural Boundaries
//!
//! - `monaco-types` owns: the data model and all pure (network-free) resolution
//! - `monaco-client` owns: how a resolved payload reaches a tenant API
//! - `monaco-deploy` owns: ordering, parallelism and failure containment

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod coordinate;
pub mod entity;
pub mod errors;
pub mod ids;
pub mod parameter;
pub mod resolve;
pub mod template;

pub use api::ClassicEndpoint;
pub use config::{
    AutomationResource, Config, ConfigType, ID_PROPERTY, NAME_PARAMETER, SCOPE_PARAMETER,
};
pub use coordinate::Coordinate;
pub use entity::{EntityMap, ResolvedEntity};
pub use errors::{ResolveError, ResolveResult};
pub use parameter::{Parameter, ParameterReference};
pub use resolve::{resolve_config, resolve_skipped, validate_parameter_graph, ResolvedConfig};
pub use template::{Template, TemplateError};
