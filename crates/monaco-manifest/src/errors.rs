//! Error types for manifest and project loading
//!
//! Loading produces error batches: everything wrong with the input set is
//! reported at once, before any network I/O happens.

use monaco_types::parameter::ParameterParseError;
use monaco_types::Coordinate;
use std::path::PathBuf;

/// Errors raised while loading the manifest file
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("{path}:{group}:{environment}: {reason}")]
    Environment {
        path: PathBuf,
        group: String,
        environment: String,
        reason: String,
    },

    #[error("{path}:{project}: {reason}")]
    Project {
        path: PathBuf,
        project: String,
        reason: String,
    },
}

impl ManifestError {
    pub fn load(path: &std::path::Path, reason: impl Into<String>) -> Self {
        ManifestError::Load {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading project configuration files
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("failed to load project {project:?}: path {path} does not exist")]
    PathMissing { project: String, path: PathBuf },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("{path}: config {id:?}: {reason}")]
    InvalidType {
        path: PathBuf,
        id: String,
        reason: String,
    },

    #[error("{path}: config {id:?}: unknown API {api:?}")]
    UnknownApi {
        path: PathBuf,
        id: String,
        api: String,
    },

    #[error("{path}: config {id:?}: entities types are download-only and cannot be deployed")]
    EntitiesNotSupported { path: PathBuf, id: String },

    #[error("{path}: config {id:?}: parameter {name:?} is reserved")]
    ReservedParameter {
        path: PathBuf,
        id: String,
        name: String,
    },

    #[error("{path}: config {id:?}: parameter {name:?}: {source}")]
    Parameter {
        path: PathBuf,
        id: String,
        name: String,
        source: ParameterParseError,
    },

    #[error("{path}: config {id:?}: template {template:?}: {source}")]
    Template {
        path: PathBuf,
        id: String,
        template: String,
        source: std::io::Error,
    },

    #[error(
        "config IDs need to be unique per project/type, found duplicate {coordinate} \
         (group {group:?}, environment {environment:?})"
    )]
    DuplicateConfigIdentifier {
        coordinate: Coordinate,
        group: String,
        environment: String,
    },
}
