//! Error types for configuration resolution

use crate::coordinate::Coordinate;
use crate::template::TemplateError;

/// Errors that can occur while resolving a configuration's parameters and
/// template. Every variant is bound to the coordinate it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{coordinate}: cyclic parameter dependency between {parameters:?}")]
    CyclicParameterDependency {
        coordinate: Coordinate,
        parameters: Vec<String>,
    },

    #[error("{coordinate}: parameter {parameter:?} referenced by {referenced_by:?} is not defined")]
    UndefinedParameter {
        coordinate: Coordinate,
        parameter: String,
        referenced_by: String,
    },

    #[error("{coordinate}: parameter {parameter:?} reads unset environment variable {variable:?}")]
    MissingEnvVar {
        coordinate: Coordinate,
        parameter: String,
        variable: String,
    },

    #[error("{coordinate}: references {referenced}, which has not been resolved")]
    UnresolvedReference {
        coordinate: Coordinate,
        referenced: Coordinate,
        property: String,
    },

    #[error("{coordinate}: {referenced} has no property {property:?}")]
    MissingProperty {
        coordinate: Coordinate,
        referenced: Coordinate,
        property: String,
        referenced_skipped: bool,
    },

    #[error("{coordinate}: required parameter \"name\" is missing")]
    MissingName { coordinate: Coordinate },

    #[error("{coordinate}: parameter \"name\" must resolve to a non-empty string")]
    InvalidName { coordinate: Coordinate },

    #[error("{coordinate}: settings configuration requires a \"scope\" parameter")]
    MissingScope { coordinate: Coordinate },

    #[error("{coordinate}: parameter \"scope\" must resolve to a non-empty string")]
    InvalidScope { coordinate: Coordinate },

    #[error("{coordinate}: {source}")]
    Template {
        coordinate: Coordinate,
        source: TemplateError,
    },
}

impl ResolveError {
    /// Coordinate of the configuration the error is bound to
    pub fn coordinate(&self) -> &Coordinate {
        match self {
            ResolveError::CyclicParameterDependency { coordinate, .. }
            | ResolveError::UndefinedParameter { coordinate, .. }
            | ResolveError::MissingEnvVar { coordinate, .. }
            | ResolveError::UnresolvedReference { coordinate, .. }
            | ResolveError::MissingProperty { coordinate, .. }
            | ResolveError::MissingName { coordinate }
            | ResolveError::InvalidName { coordinate }
            | ResolveError::MissingScope { coordinate }
            | ResolveError::InvalidScope { coordinate }
            | ResolveError::Template { coordinate, .. } => coordinate,
        }
    }
}

/// Result type alias for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;
