//! Just-in-time configuration resolution
//!
//! Computes a configuration's final payload from its parameters, the entity
//! map of the current environment, and the environment/group built-ins. The
//! algorithm:
//!
//! 1. topologically sort the configuration's own parameters by their
//!    sibling references, refusing cycles
//! 2. resolve each parameter in order, consulting earlier parameters and the
//!    entity map for cross-configuration references
//! 3. substitute the resolved scalars into the template
//!
//! Resolution never touches the network. The orchestrator guarantees that
//! every cross-configuration reference points at an already-deployed entity;
//! a miss is a hard error.

use crate::config::{Config, ConfigType, NAME_PARAMETER, SCOPE_PARAMETER};
use crate::coordinate::Coordinate;
use crate::entity::ResolvedEntity;
use crate::errors::{ResolveError, ResolveResult};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Inputs available while resolving a single parameter
pub struct ResolveContext<'a> {
    /// Coordinate of the configuration being resolved
    pub coordinate: &'a Coordinate,
    /// Name of the parameter being resolved, for error reporting
    pub parameter: &'a str,
    pub environment: &'a str,
    pub group: &'a str,
    /// Already-resolved parameters of this configuration
    pub resolved: &'a BTreeMap<String, Value>,
    /// Deploy results of predecessor configurations
    pub entities: &'a HashMap<Coordinate, ResolvedEntity>,
}

/// Fully resolved form of one configuration, ready for its dialect adapter
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Resolved `name` parameter, mandatory for classic dialects
    pub entity_name: Option<String>,
    /// Resolved `scope` parameter, mandatory for settings
    pub scope: Option<String>,
    /// All resolved parameter values; becomes the entity's property map
    pub properties: BTreeMap<String, Value>,
    /// Rendered template
    pub payload: String,
}

/// Resolve parameters and render the template of one configuration.
pub fn resolve_config(
    config: &Config,
    entities: &HashMap<Coordinate, ResolvedEntity>,
) -> ResolveResult<ResolvedConfig> {
    let order = parameter_order(config)?;

    let mut resolved: BTreeMap<String, Value> = BTreeMap::new();
    for name in &order {
        let parameter = &config.parameters[name];
        let ctx = ResolveContext {
            coordinate: &config.coordinate,
            parameter: name,
            environment: &config.environment,
            group: &config.group,
            resolved: &resolved,
            entities,
        };
        let value = parameter.resolve(&ctx)?;
        resolved.insert(name.clone(), value);
    }

    let entity_name = scalar_string(&resolved, NAME_PARAMETER);
    let scope = scalar_string(&resolved, SCOPE_PARAMETER);

    match &config.config_type {
        ConfigType::Classic { .. } => {
            if !resolved.contains_key(NAME_PARAMETER) {
                return Err(ResolveError::MissingName {
                    coordinate: config.coordinate.clone(),
                });
            }
            if entity_name.as_deref().unwrap_or("").is_empty() {
                return Err(ResolveError::InvalidName {
                    coordinate: config.coordinate.clone(),
                });
            }
        }
        ConfigType::Settings { .. } => {
            if !resolved.contains_key(SCOPE_PARAMETER) {
                return Err(ResolveError::MissingScope {
                    coordinate: config.coordinate.clone(),
                });
            }
            if scope.as_deref().unwrap_or("").is_empty() {
                return Err(ResolveError::InvalidScope {
                    coordinate: config.coordinate.clone(),
                });
            }
        }
        ConfigType::Automation { .. } | ConfigType::Bucket => {}
    }

    let mut template_values: BTreeMap<String, String> = resolved
        .iter()
        .map(|(k, v)| (k.clone(), value_to_template_string(v)))
        .collect();
    template_values.insert(
        "environment".to_string(),
        escape_json_string(&config.environment),
    );
    template_values.insert("group".to_string(), escape_json_string(&config.group));

    let payload = config
        .template
        .render(&template_values)
        .map_err(|source| ResolveError::Template {
            coordinate: config.coordinate.clone(),
            source,
        })?;

    Ok(ResolvedConfig {
        entity_name,
        scope,
        properties: resolved,
        payload,
    })
}

/// Resolve a skipped configuration into the placeholder entity it publishes.
///
/// Only parameters without references are attempted; ones that cannot be
/// resolved without the network or other entities are left out. The entity
/// carries no `id` property, so a real-run reference to a skipped
/// configuration's id fails with a missing-property error.
pub fn resolve_skipped(config: &Config) -> ResolvedEntity {
    let empty_resolved = BTreeMap::new();
    let no_entities = HashMap::new();
    let mut properties: BTreeMap<String, Value> = BTreeMap::new();

    for (name, parameter) in &config.parameters {
        if !parameter.references(&config.coordinate).is_empty() {
            continue;
        }
        let ctx = ResolveContext {
            coordinate: &config.coordinate,
            parameter: name,
            environment: &config.environment,
            group: &config.group,
            resolved: &empty_resolved,
            entities: &no_entities,
        };
        if let Ok(value) = parameter.resolve(&ctx) {
            properties.insert(name.clone(), value);
        }
    }

    let entity_name = scalar_string(&properties, NAME_PARAMETER)
        .unwrap_or_else(|| config.coordinate.config_id.clone());

    ResolvedEntity {
        coordinate: config.coordinate.clone(),
        entity_name,
        properties,
        skip: true,
    }
}

/// Validate a configuration's parameter graph without resolving values:
/// rejects cycles and references to undefined sibling parameters.
pub fn validate_parameter_graph(config: &Config) -> ResolveResult<()> {
    parameter_order(config).map(|_| ())
}

/// Topological order over the configuration's own parameters.
fn parameter_order(config: &Config) -> ResolveResult<Vec<String>> {
    // dependency -> dependents, plus in-degree per parameter
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut in_degree: BTreeMap<String, usize> = config
        .parameters
        .keys()
        .map(|n| (n.clone(), 0))
        .collect();

    for (name, parameter) in &config.parameters {
        for reference in parameter.references(&config.coordinate) {
            if reference.config != config.coordinate {
                continue;
            }
            if !config.parameters.contains_key(&reference.property) {
                return Err(ResolveError::UndefinedParameter {
                    coordinate: config.coordinate.clone(),
                    parameter: reference.property.clone(),
                    referenced_by: name.clone(),
                });
            }
            // self-reference is the smallest possible cycle
            if reference.property == *name {
                return Err(ResolveError::CyclicParameterDependency {
                    coordinate: config.coordinate.clone(),
                    parameters: vec![name.clone()],
                });
            }
            dependents
                .entry(reference.property.clone())
                .or_default()
                .push(name.clone());
            in_degree.entry(name.clone()).and_modify(|d| *d += 1);
        }
    }

    let mut ready: BTreeSet<String> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| n.clone())
        .collect();
    let mut order = Vec::with_capacity(config.parameters.len());

    while let Some(next) = ready.iter().next().cloned() {
        ready.remove(&next);
        if let Some(children) = dependents.get(&next) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child.clone());
                    }
                }
            }
        }
        order.push(next);
    }

    if order.len() < config.parameters.len() {
        let remaining: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(n, _)| n)
            .collect();
        return Err(ResolveError::CyclicParameterDependency {
            coordinate: config.coordinate.clone(),
            parameters: remaining,
        });
    }

    Ok(order)
}

fn scalar_string(values: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match values.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// String form of a value for compound formatting: strings verbatim,
/// everything else as compact JSON.
pub(crate) fn value_to_raw_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// String form of a value for template substitution. Strings are escaped for
/// embedding between JSON quotes; collections render as JSON literals.
fn value_to_template_string(value: &Value) -> String {
    match value {
        Value::String(s) => escape_json_string(s),
        other => other.to_string(),
    }
}

fn escape_json_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
