//! Payload templates
//!
//! A template is a named text blob with `{{.key}}` placeholders. Rendering is
//! literal substitution over a map of resolved scalar values; the template
//! language has no conditionals, loops or functions.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced while rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {template:?} references unknown keys: {keys:?}")]
    MissingKeys { template: String, keys: Vec<String> },
}

/// A named payload template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Substitute every `{{.key}}` placeholder with its value.
    ///
    /// Unknown keys are collected and reported together. Brace pairs that do
    /// not form a `.key` placeholder are left untouched.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        render_placeholders(&self.content, values).map_err(|keys| TemplateError::MissingKeys {
            template: self.name.clone(),
            keys,
        })
    }
}

/// Placeholder substitution shared by templates and compound parameters.
///
/// Returns the rendered string, or the list of referenced keys missing from
/// `values`.
pub(crate) fn render_placeholders(
    content: &str,
    values: &BTreeMap<String, String>,
) -> Result<String, Vec<String>> {
    let mut out = String::with_capacity(content.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => {
                let inner = after_open[..end].trim();
                if let Some(key) = inner.strip_prefix('.') {
                    match values.get(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            if !missing.iter().any(|k| k == key) {
                                missing.push(key.to_string());
                            }
                        }
                    }
                } else {
                    // not a placeholder, keep the braces verbatim
                    out.push_str(&rest[start..start + 2 + end + 2]);
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(missing)
    }
}
