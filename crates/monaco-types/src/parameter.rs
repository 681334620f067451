//! The polymorphic parameter system
//!
//! Every parameter supports exactly two capabilities: it declares which other
//! configurations (or sibling parameters) it [references](Parameter::references),
//! and it [resolves](Parameter::resolve) to a JSON value once everything it
//! references is available. New variants register under a string kind used by
//! the YAML persistence format.

use crate::coordinate::Coordinate;
use crate::errors::{ResolveError, ResolveResult};
use crate::resolve::{value_to_raw_string, ResolveContext};
use crate::template::render_placeholders;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Kind discriminators accepted in the `type` field of a parameter definition.
pub const KIND_VALUE: &str = "value";
pub const KIND_ENVIRONMENT: &str = "environment";
pub const KIND_COMPOUND: &str = "compound";
pub const KIND_REFERENCE: &str = "reference";
pub const KIND_LIST: &str = "list";

/// A declared dependency on a property of some configuration.
///
/// References into the owning configuration (same coordinate) point at
/// sibling parameters; references to other coordinates are resolved against
/// the entity map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterReference {
    pub config: Coordinate,
    pub property: String,
}

/// A configuration parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Literal value
    Value(Value),
    /// Environment-variable lookup, resolved without network access
    Environment {
        name: String,
        default: Option<String>,
    },
    /// Format string over sibling parameters of the same configuration
    Compound {
        format: String,
        references: Vec<String>,
    },
    /// Property of another configuration's deploy result
    Reference(ParameterReference),
    /// Ordered collection of parameters, resolving to a JSON array
    List(Vec<Parameter>),
}

/// Errors produced while parsing a parameter definition from YAML
#[derive(Debug, Error)]
pub enum ParameterParseError {
    #[error("unknown parameter type {0:?}")]
    UnknownKind(String),
    #[error("parameter type {kind:?} requires field {field:?}")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("invalid parameter definition: {0}")]
    InvalidStructure(String),
}

impl Parameter {
    /// Kind string of this variant, matching the persistence discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Parameter::Value(_) => KIND_VALUE,
            Parameter::Environment { .. } => KIND_ENVIRONMENT,
            Parameter::Compound { .. } => KIND_COMPOUND,
            Parameter::Reference(_) => KIND_REFERENCE,
            Parameter::List(_) => KIND_LIST,
        }
    }

    /// All references this parameter declares. `owner` is the coordinate of
    /// the configuration the parameter belongs to; compound parameters
    /// reference their siblings through it.
    pub fn references(&self, owner: &Coordinate) -> Vec<ParameterReference> {
        match self {
            Parameter::Value(_) | Parameter::Environment { .. } => Vec::new(),
            Parameter::Compound { references, .. } => references
                .iter()
                .map(|name| ParameterReference {
                    config: owner.clone(),
                    property: name.clone(),
                })
                .collect(),
            Parameter::Reference(r) => vec![r.clone()],
            Parameter::List(items) => items
                .iter()
                .flat_map(|p| p.references(owner))
                .collect(),
        }
    }

    /// Resolve this parameter to a JSON value.
    ///
    /// Consults already-resolved sibling parameters and the entity snapshot in
    /// `ctx`; performs no network I/O.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> ResolveResult<Value> {
        match self {
            Parameter::Value(v) => Ok(v.clone()),

            Parameter::Environment { name, default } => match std::env::var(name) {
                Ok(v) => Ok(Value::String(v)),
                Err(_) => match default {
                    Some(d) => Ok(Value::String(d.clone())),
                    None => Err(ResolveError::MissingEnvVar {
                        coordinate: ctx.coordinate.clone(),
                        parameter: ctx.parameter.to_string(),
                        variable: name.clone(),
                    }),
                },
            },

            Parameter::Compound { format, references } => {
                let mut values = BTreeMap::new();
                for name in references {
                    let value = ctx.resolved.get(name).ok_or_else(|| {
                        ResolveError::UndefinedParameter {
                            coordinate: ctx.coordinate.clone(),
                            parameter: name.clone(),
                            referenced_by: ctx.parameter.to_string(),
                        }
                    })?;
                    values.insert(name.clone(), value_to_raw_string(value));
                }
                match render_placeholders(format, &values) {
                    Ok(rendered) => Ok(Value::String(rendered)),
                    Err(keys) => Err(ResolveError::UndefinedParameter {
                        coordinate: ctx.coordinate.clone(),
                        parameter: keys.join(", "),
                        referenced_by: ctx.parameter.to_string(),
                    }),
                }
            }

            Parameter::Reference(r) => {
                if r.config == *ctx.coordinate {
                    ctx.resolved.get(&r.property).cloned().ok_or_else(|| {
                        ResolveError::UndefinedParameter {
                            coordinate: ctx.coordinate.clone(),
                            parameter: r.property.clone(),
                            referenced_by: ctx.parameter.to_string(),
                        }
                    })
                } else {
                    let entity = ctx.entities.get(&r.config).ok_or_else(|| {
                        ResolveError::UnresolvedReference {
                            coordinate: ctx.coordinate.clone(),
                            referenced: r.config.clone(),
                            property: r.property.clone(),
                        }
                    })?;
                    entity.properties.get(&r.property).cloned().ok_or_else(|| {
                        ResolveError::MissingProperty {
                            coordinate: ctx.coordinate.clone(),
                            referenced: r.config.clone(),
                            property: r.property.clone(),
                            referenced_skipped: entity.skip,
                        }
                    })
                }
            }

            Parameter::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.resolve(ctx)?);
                }
                Ok(Value::Array(values))
            }
        }
    }

    /// Parse a parameter definition from its YAML form.
    ///
    /// Accepted forms: a bare scalar (value parameter), a sequence of 3 or 4
    /// strings (reference shorthand `[project,] type, configId, property`), or
    /// a mapping with a `type` discriminator.
    pub fn parse(
        raw: &serde_yaml::Value,
        default_project: &str,
        default_type: &str,
    ) -> Result<Parameter, ParameterParseError> {
        use serde_yaml::Value as Yaml;

        match raw {
            Yaml::Null | Yaml::Bool(_) | Yaml::Number(_) | Yaml::String(_) => {
                Ok(Parameter::Value(yaml_to_json(raw)))
            }

            Yaml::Sequence(items) => {
                parse_reference_shorthand(items, default_project).map(Parameter::Reference)
            }

            Yaml::Mapping(map) => {
                let kind = map
                    .get("type")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| {
                        ParameterParseError::InvalidStructure(
                            "parameter mapping requires a string `type` field".into(),
                        )
                    })?;

                match kind {
                    KIND_VALUE => {
                        let value = map.get("value").ok_or(ParameterParseError::MissingField {
                            kind: KIND_VALUE,
                            field: "value",
                        })?;
                        Ok(Parameter::Value(yaml_to_json(value)))
                    }
                    KIND_ENVIRONMENT => {
                        let name = map
                            .get("name")
                            .and_then(Yaml::as_str)
                            .ok_or(ParameterParseError::MissingField {
                                kind: KIND_ENVIRONMENT,
                                field: "name",
                            })?
                            .to_string();
                        let default = map
                            .get("default")
                            .map(|d| value_to_raw_string(&yaml_to_json(d)));
                        Ok(Parameter::Environment { name, default })
                    }
                    KIND_COMPOUND => {
                        let format = map
                            .get("format")
                            .and_then(Yaml::as_str)
                            .ok_or(ParameterParseError::MissingField {
                                kind: KIND_COMPOUND,
                                field: "format",
                            })?
                            .to_string();
                        let references = match map.get("references") {
                            None => Vec::new(),
                            Some(Yaml::Sequence(items)) => items
                                .iter()
                                .map(|i| {
                                    i.as_str().map(str::to_string).ok_or_else(|| {
                                        ParameterParseError::InvalidStructure(
                                            "compound references must be parameter names".into(),
                                        )
                                    })
                                })
                                .collect::<Result<Vec<_>, _>>()?,
                            Some(_) => {
                                return Err(ParameterParseError::InvalidStructure(
                                    "compound references must be a sequence".into(),
                                ))
                            }
                        };
                        Ok(Parameter::Compound { format, references })
                    }
                    KIND_REFERENCE => {
                        let config_id = map
                            .get("configId")
                            .and_then(Yaml::as_str)
                            .ok_or(ParameterParseError::MissingField {
                                kind: KIND_REFERENCE,
                                field: "configId",
                            })?;
                        let property = map
                            .get("property")
                            .and_then(Yaml::as_str)
                            .ok_or(ParameterParseError::MissingField {
                                kind: KIND_REFERENCE,
                                field: "property",
                            })?;
                        let project = map
                            .get("project")
                            .and_then(Yaml::as_str)
                            .unwrap_or(default_project);
                        let config_type = map
                            .get("configType")
                            .and_then(Yaml::as_str)
                            .unwrap_or(default_type);
                        Ok(Parameter::Reference(ParameterReference {
                            config: Coordinate::new(project, config_type, config_id),
                            property: property.to_string(),
                        }))
                    }
                    KIND_LIST => {
                        let values = match map.get("values") {
                            Some(Yaml::Sequence(items)) => items,
                            Some(_) => {
                                return Err(ParameterParseError::InvalidStructure(
                                    "list values must be a sequence".into(),
                                ))
                            }
                            None => {
                                return Err(ParameterParseError::MissingField {
                                    kind: KIND_LIST,
                                    field: "values",
                                })
                            }
                        };
                        let items = values
                            .iter()
                            .map(|v| Parameter::parse(v, default_project, default_type))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Parameter::List(items))
                    }
                    other => Err(ParameterParseError::UnknownKind(other.to_string())),
                }
            }

            Yaml::Tagged(tagged) => Parameter::parse(&tagged.value, default_project, default_type),
        }
    }
}

fn parse_reference_shorthand(
    items: &[serde_yaml::Value],
    default_project: &str,
) -> Result<ParameterReference, ParameterParseError> {
    let parts: Vec<&str> = items.iter().filter_map(serde_yaml::Value::as_str).collect();
    if parts.len() != items.len() {
        return Err(ParameterParseError::InvalidReference(
            "reference shorthand entries must be strings".into(),
        ));
    }
    match parts.as_slice() {
        [config_type, config_id, property] => Ok(ParameterReference {
            config: Coordinate::new(default_project, *config_type, *config_id),
            property: (*property).to_string(),
        }),
        [project, config_type, config_id, property] => Ok(ParameterReference {
            config: Coordinate::new(*project, *config_type, *config_id),
            property: (*property).to_string(),
        }),
        _ => Err(ParameterParseError::InvalidReference(format!(
            "reference shorthand needs 3 or 4 entries, got {}",
            parts.len()
        ))),
    }
}

/// Lossy-but-total conversion from YAML scalars and collections to JSON.
pub fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    Yaml::String(s) => s.clone(),
                    other => value_to_raw_string(&yaml_to_json(other)),
                };
                out.insert(key, yaml_to_json(v));
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(input: &str) -> serde_yaml::Value {
        serde_yaml::from_str(input).unwrap()
    }

    fn parse(input: &str) -> Parameter {
        Parameter::parse(&yaml(input), "proj", "alerting-profile").unwrap()
    }

    #[test]
    fn test_parse_bare_scalar_is_value() {
        assert_eq!(parse("hello"), Parameter::Value(Value::String("hello".into())));
        assert_eq!(parse("42"), Parameter::Value(Value::Number(42.into())));
    }

    #[test]
    fn test_parse_reference_shorthand_defaults_project() {
        let p = parse(r#"["management-zone", "zone", "id"]"#);
        assert_eq!(
            p,
            Parameter::Reference(ParameterReference {
                config: Coordinate::new("proj", "management-zone", "zone"),
                property: "id".into(),
            })
        );
    }

    #[test]
    fn test_parse_reference_shorthand_full_form() {
        let p = parse(r#"["other", "management-zone", "zone", "name"]"#);
        assert_eq!(
            p,
            Parameter::Reference(ParameterReference {
                config: Coordinate::new("other", "management-zone", "zone"),
                property: "name".into(),
            })
        );
    }

    #[test]
    fn test_parse_reference_mapping_defaults_type() {
        let p = parse("{type: reference, configId: zone, property: id}");
        match p {
            Parameter::Reference(r) => {
                assert_eq!(r.config, Coordinate::new("proj", "alerting-profile", "zone"));
            }
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_kind_fails() {
        let err = Parameter::parse(&yaml("{type: secret, name: x}"), "p", "t").unwrap_err();
        assert!(matches!(err, ParameterParseError::UnknownKind(k) if k == "secret"));
    }

    #[test]
    fn test_parse_list_recurses() {
        let p = parse("{type: list, values: [a, {type: value, value: 2}]}");
        match p {
            Parameter::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_compound_references_point_at_owner() {
        let owner = Coordinate::new("p", "t", "c");
        let p = parse("{type: compound, format: '{{.a}}', references: [a]}");
        let refs = p.references(&owner);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].config, owner);
        assert_eq!(refs[0].property, "a");
    }
}
