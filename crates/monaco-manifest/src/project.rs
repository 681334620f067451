//! Project loading
//!
//! Walks each project's directory tree for YAML configuration files and
//! expands every declared configuration once per selected environment. The
//! loaded [Project] groups configurations per environment and type and
//! records which other projects it depends on.

use crate::errors::ProjectError;
use crate::manifest::{EnvironmentDefinition, Manifest, ProjectDefinition};
use monaco_types::api;
use monaco_types::{
    AutomationResource, Config, ConfigType, Coordinate, Parameter, Template, NAME_PARAMETER,
    SCOPE_PARAMETER,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BUCKET_API_TYPE: &str = "bucket";

/// Parameter names users may not define themselves.
const RESERVED_PARAMETERS: &[&str] = &[NAME_PARAMETER, SCOPE_PARAMETER, "id", "environment", "group"];

/// A loaded project
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    /// Name of the grouping parent, if any
    pub group_id: Option<String>,
    /// environment name -> type name -> configurations
    pub configs: HashMap<String, HashMap<String, Vec<Config>>>,
    /// environment name -> projects referenced by this project's configs
    pub dependencies: HashMap<String, Vec<String>>,
}

// ---- raw YAML shapes -------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    configs: Vec<RawConfigEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawConfigEntry {
    id: String,
    #[serde(rename = "type")]
    type_definition: RawTypeDefinition,
    config: RawConfigDefinition,
}

/// `type` is either a bare classic api name or a structured definition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTypeDefinition {
    Shorthand(String),
    Full(RawTypeMap),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawTypeMap {
    #[serde(default)]
    api: Option<String>,
    #[serde(default)]
    settings: Option<RawSettings>,
    #[serde(default)]
    automation: Option<RawAutomation>,
    #[serde(default)]
    entities: Option<RawEntities>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawSettings {
    schema: String,
    #[serde(default)]
    schema_version: Option<String>,
    scope: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawAutomation {
    resource: AutomationResource,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawEntities {
    #[allow(dead_code)]
    entities_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawConfigDefinition {
    #[serde(default)]
    name: Option<serde_yaml::Value>,
    template: String,
    #[serde(default)]
    parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    skip: bool,
    #[serde(default)]
    origin_object_id: Option<String>,
}

// ---- loading ---------------------------------------------------------------

/// Load every project of the manifest, expanding configurations per selected
/// environment. All problems across all projects are returned as one batch.
pub fn load_projects(
    working_dir: &Path,
    manifest: &Manifest,
) -> Result<Vec<Project>, Vec<ProjectError>> {
    info!(count = manifest.projects.len(), "Loading projects");

    let environments: Vec<&EnvironmentDefinition> = manifest.environments.values().collect();
    let mut projects = Vec::new();
    let mut errs = Vec::new();

    for definition in manifest.projects.values() {
        match load_project(working_dir, definition, &environments) {
            Ok(project) => projects.push(project),
            Err(mut project_errs) => errs.append(&mut project_errs),
        }
    }

    if errs.is_empty() {
        Ok(projects)
    } else {
        Err(errs)
    }
}

fn load_project(
    working_dir: &Path,
    definition: &ProjectDefinition,
    environments: &[&EnvironmentDefinition],
) -> Result<Project, Vec<ProjectError>> {
    let root = working_dir.join(&definition.path);
    if !root.is_dir() {
        return Err(vec![ProjectError::PathMissing {
            project: definition.name.clone(),
            path: root,
        }]);
    }

    debug!(project = %definition.name, path = %root.display(), "Loading project");

    let files = find_config_files(&root).map_err(|e| {
        vec![ProjectError::Io {
            path: root.clone(),
            source: e,
        }]
    })?;

    let mut configs: Vec<Config> = Vec::new();
    let mut errs: Vec<ProjectError> = Vec::new();

    for file in files {
        match load_config_file(&file, &definition.name, environments) {
            Ok(mut loaded) => configs.append(&mut loaded),
            Err(mut file_errs) => errs.append(&mut file_errs),
        }
    }

    for duplicate in find_duplicate_identifiers(&configs) {
        errs.push(duplicate);
    }

    if !errs.is_empty() {
        return Err(errs);
    }

    let mut config_map: HashMap<String, HashMap<String, Vec<Config>>> = HashMap::new();
    for config in &configs {
        config_map
            .entry(config.environment.clone())
            .or_default()
            .entry(config.coordinate.config_type.clone())
            .or_default()
            .push(config.clone());
    }

    Ok(Project {
        id: definition.name.clone(),
        group_id: definition.group.clone(),
        dependencies: to_dependencies(&definition.name, &configs),
        configs: config_map,
    })
}

/// All YAML files under `root`; directories whose name starts with a dot are
/// skipped entirely.
fn find_config_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_dir() {
                if !name.starts_with('.') {
                    stack.push(path);
                }
                continue;
            }
            if name.ends_with(".yaml") || name.ends_with(".yml") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn load_config_file(
    file: &Path,
    project: &str,
    environments: &[&EnvironmentDefinition],
) -> Result<Vec<Config>, Vec<ProjectError>> {
    let data = std::fs::read_to_string(file).map_err(|e| {
        vec![ProjectError::Io {
            path: file.to_path_buf(),
            source: e,
        }]
    })?;

    let raw: RawConfigFile = serde_yaml::from_str(&data).map_err(|e| {
        vec![ProjectError::Yaml {
            path: file.to_path_buf(),
            source: e,
        }]
    })?;

    let mut configs = Vec::new();
    let mut errs = Vec::new();

    for entry in &raw.configs {
        match load_config_entry(file, project, entry, environments) {
            Ok(mut loaded) => configs.append(&mut loaded),
            Err(e) => errs.push(e),
        }
    }

    if errs.is_empty() {
        Ok(configs)
    } else {
        Err(errs)
    }
}

fn load_config_entry(
    file: &Path,
    project: &str,
    entry: &RawConfigEntry,
    environments: &[&EnvironmentDefinition],
) -> Result<Vec<Config>, ProjectError> {
    let (config_type, scope) = parse_type_definition(file, &entry.id, &entry.type_definition)?;
    let type_name = config_type.type_name().to_string();

    let template_path = file
        .parent()
        .unwrap_or(Path::new("."))
        .join(&entry.config.template);
    let template_content =
        std::fs::read_to_string(&template_path).map_err(|e| ProjectError::Template {
            path: file.to_path_buf(),
            id: entry.id.clone(),
            template: entry.config.template.clone(),
            source: e,
        })?;
    let template = Template::new(entry.config.template.clone(), template_content);

    let mut parameters: BTreeMap<String, Parameter> = BTreeMap::new();
    for (name, raw_value) in &entry.config.parameters {
        if RESERVED_PARAMETERS.contains(&name.as_str()) {
            return Err(ProjectError::ReservedParameter {
                path: file.to_path_buf(),
                id: entry.id.clone(),
                name: name.clone(),
            });
        }
        let parameter =
            Parameter::parse(raw_value, project, &type_name).map_err(|e| ProjectError::Parameter {
                path: file.to_path_buf(),
                id: entry.id.clone(),
                name: name.clone(),
                source: e,
            })?;
        parameters.insert(name.clone(), parameter);
    }

    if let Some(raw_name) = &entry.config.name {
        let parameter =
            Parameter::parse(raw_name, project, &type_name).map_err(|e| ProjectError::Parameter {
                path: file.to_path_buf(),
                id: entry.id.clone(),
                name: NAME_PARAMETER.to_string(),
                source: e,
            })?;
        parameters.insert(NAME_PARAMETER.to_string(), parameter);
    }

    if let Some(raw_scope) = &scope {
        let parameter =
            Parameter::parse(raw_scope, project, &type_name).map_err(|e| ProjectError::Parameter {
                path: file.to_path_buf(),
                id: entry.id.clone(),
                name: SCOPE_PARAMETER.to_string(),
                source: e,
            })?;
        parameters.insert(SCOPE_PARAMETER.to_string(), parameter);
    }

    let configs = environments
        .iter()
        .map(|env| Config {
            coordinate: Coordinate::new(project, &type_name, &entry.id),
            config_type: config_type.clone(),
            template: template.clone(),
            parameters: parameters.clone(),
            skip: entry.config.skip,
            origin_object_id: entry.config.origin_object_id.clone(),
            environment: env.name.clone(),
            group: env.group.clone(),
        })
        .collect();

    Ok(configs)
}

/// Validate the `type` section and map it onto a [ConfigType]. Settings
/// definitions additionally yield their raw scope parameter.
fn parse_type_definition(
    file: &Path,
    id: &str,
    raw: &RawTypeDefinition,
) -> Result<(ConfigType, Option<serde_yaml::Value>), ProjectError> {
    let invalid = |reason: String| ProjectError::InvalidType {
        path: file.to_path_buf(),
        id: id.to_string(),
        reason,
    };

    let map = match raw {
        RawTypeDefinition::Shorthand(api_name) => {
            return classic_type(file, id, api_name).map(|t| (t, None));
        }
        RawTypeDefinition::Full(map) => map,
    };

    let set_sections = [
        map.api.is_some(),
        map.settings.is_some(),
        map.automation.is_some(),
        map.entities.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    match set_sections {
        0 => Err(invalid("type configuration is missing or unknown".into())),
        1 => {
            if let Some(api_name) = &map.api {
                return classic_type(file, id, api_name).map(|t| (t, None));
            }
            if let Some(settings) = &map.settings {
                if settings.schema.is_empty() {
                    return Err(invalid("missing 'type.settings.schema' property".into()));
                }
                return Ok((
                    ConfigType::Settings {
                        schema_id: settings.schema.clone(),
                        schema_version: settings.schema_version.clone(),
                    },
                    Some(settings.scope.clone()),
                ));
            }
            if let Some(automation) = &map.automation {
                return Ok((
                    ConfigType::Automation {
                        resource: automation.resource,
                    },
                    None,
                ));
            }
            Err(ProjectError::EntitiesNotSupported {
                path: file.to_path_buf(),
                id: id.to_string(),
            })
        }
        _ => Err(invalid("wrong configuration of type property".into())),
    }
}

fn classic_type(file: &Path, id: &str, api_name: &str) -> Result<ConfigType, ProjectError> {
    if api_name == BUCKET_API_TYPE {
        return Ok(ConfigType::Bucket);
    }
    if api::lookup(api_name).is_none() {
        return Err(ProjectError::UnknownApi {
            path: file.to_path_buf(),
            id: id.to_string(),
            api: api_name.to_string(),
        });
    }
    Ok(ConfigType::Classic {
        api: api_name.to_string(),
    })
}

/// Identifiers must be unique per `(group, environment, coordinate)`.
fn find_duplicate_identifiers(configs: &[Config]) -> Vec<ProjectError> {
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for config in configs {
        let key = format!(
            "{}:{}:{}",
            config.group, config.environment, config.coordinate
        );
        if !seen.insert(key) {
            duplicates.push(ProjectError::DuplicateConfigIdentifier {
                coordinate: config.coordinate.clone(),
                group: config.group.clone(),
                environment: config.environment.clone(),
            });
        }
    }
    duplicates
}

fn to_dependencies(project: &str, configs: &[Config]) -> HashMap<String, Vec<String>> {
    let mut result: HashMap<String, Vec<String>> = HashMap::new();

    for config in configs {
        if config.skip {
            continue;
        }
        for reference in config.cross_config_references() {
            if reference.config.project == project {
                continue;
            }
            let deps = result.entry(config.environment.clone()).or_default();
            if !deps.contains(&reference.config.project) {
                deps.push(reference.config.project.clone());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Auth, AuthSecret, UrlDefinition, UrlKind};
    use std::io::Write;

    fn env(name: &str, group: &str) -> EnvironmentDefinition {
        EnvironmentDefinition {
            name: name.to_string(),
            url: UrlDefinition {
                kind: UrlKind::Value,
                value: "https://dev.example.com".into(),
                env_var: None,
            },
            auth: Auth {
                token: AuthSecret {
                    name: "TOKEN".into(),
                    value: "t".into(),
                },
                oauth: None,
            },
            group: group.to_string(),
        }
    }

    fn manifest_with(projects: &[(&str, &str)], envs: &[EnvironmentDefinition]) -> Manifest {
        Manifest {
            projects: projects
                .iter()
                .map(|(name, path)| {
                    (
                        name.to_string(),
                        ProjectDefinition {
                            name: name.to_string(),
                            group: None,
                            path: PathBuf::from(path),
                        },
                    )
                })
                .collect(),
            environments: envs.iter().map(|e| (e.name.clone(), e.clone())).collect(),
        }
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    const PROFILE_YAML: &str = r#"
configs:
  - id: profile
    type: alerting-profile
    config:
      name: "Main profile"
      template: profile.json
"#;

    #[test]
    fn test_load_simple_project() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "infra/alerting/profile.yaml", PROFILE_YAML);
        write(
            dir.path(),
            "infra/alerting/profile.json",
            r#"{ "displayName": "{{.name}}" }"#,
        );

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let projects = load_projects(dir.path(), &manifest).unwrap();

        assert_eq!(projects.len(), 1);
        let configs = &projects[0].configs["dev"]["alerting-profile"];
        assert_eq!(configs.len(), 1);
        let config = &configs[0];
        assert_eq!(
            config.coordinate,
            Coordinate::new("infra", "alerting-profile", "profile")
        );
        assert!(config.parameters.contains_key(NAME_PARAMETER));
        assert_eq!(config.environment, "dev");
        assert_eq!(config.group, "default");
    }

    #[test]
    fn test_configs_are_expanded_per_environment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "infra/profile.yaml", PROFILE_YAML);
        write(dir.path(), "infra/profile.json", "{}");

        let manifest = manifest_with(
            &[("infra", "infra")],
            &[env("dev", "default"), env("prod", "default")],
        );
        let projects = load_projects(dir.path(), &manifest).unwrap();

        assert!(projects[0].configs.contains_key("dev"));
        assert!(projects[0].configs.contains_key("prod"));
    }

    #[test]
    fn test_settings_type_gets_scope_parameter() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "infra/slo.yaml",
            r#"
configs:
  - id: slo
    type:
      settings:
        schema: builtin:monitoring.slo
        schemaVersion: "6.0.13"
        scope: environment
    config:
      name: "SLO"
      template: slo.json
"#,
        );
        write(dir.path(), "infra/slo.json", "{}");

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let projects = load_projects(dir.path(), &manifest).unwrap();

        let config = &projects[0].configs["dev"]["builtin:monitoring.slo"][0];
        assert_eq!(
            config.config_type,
            ConfigType::Settings {
                schema_id: "builtin:monitoring.slo".into(),
                schema_version: Some("6.0.13".into()),
            }
        );
        assert!(config.parameters.contains_key(SCOPE_PARAMETER));
    }

    #[test]
    fn test_unknown_api_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "infra/x.yaml",
            r#"
configs:
  - id: x
    type: not-a-real-api
    config:
      name: x
      template: x.json
"#,
        );
        write(dir.path(), "infra/x.json", "{}");

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let errs = load_projects(dir.path(), &manifest).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ProjectError::UnknownApi { api, .. } if api == "not-a-real-api")));
    }

    #[test]
    fn test_entities_type_is_rejected_for_deploy() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "infra/x.yaml",
            r#"
configs:
  - id: x
    type:
      entities:
        entitiesType: HOST
    config:
      name: x
      template: x.json
"#,
        );
        write(dir.path(), "infra/x.json", "{}");

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let errs = load_projects(dir.path(), &manifest).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ProjectError::EntitiesNotSupported { .. })));
    }

    #[test]
    fn test_duplicate_config_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "infra/a.yaml", PROFILE_YAML);
        write(dir.path(), "infra/b.yaml", PROFILE_YAML);
        write(dir.path(), "infra/profile.json", "{}");

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let errs = load_projects(dir.path(), &manifest).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ProjectError::DuplicateConfigIdentifier { .. })));
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "infra/profile.yaml", PROFILE_YAML);
        write(dir.path(), "infra/profile.json", "{}");
        // would be a duplicate if loaded
        write(dir.path(), "infra/.backup/profile.yaml", PROFILE_YAML);

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let projects = load_projects(dir.path(), &manifest).unwrap();
        assert_eq!(projects[0].configs["dev"]["alerting-profile"].len(), 1);
    }

    #[test]
    fn test_reserved_parameter_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "infra/x.yaml",
            r#"
configs:
  - id: x
    type: alerting-profile
    config:
      name: x
      template: x.json
      parameters:
        id: "user-supplied"
"#,
        );
        write(dir.path(), "infra/x.json", "{}");

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let errs = load_projects(dir.path(), &manifest).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ProjectError::ReservedParameter { name, .. } if name == "id")));
    }

    #[test]
    fn test_dependencies_are_recorded_per_environment() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "app/profile.yaml",
            r#"
configs:
  - id: profile
    type: alerting-profile
    config:
      name: "App profile"
      template: profile.json
      parameters:
        zoneId:
          type: reference
          project: infra
          configType: management-zone
          configId: zone
          property: id
"#,
        );
        write(dir.path(), "app/profile.json", "{}");

        let manifest = manifest_with(&[("app", "app")], &[env("dev", "default")]);
        let projects = load_projects(dir.path(), &manifest).unwrap();
        assert_eq!(projects[0].dependencies["dev"], vec!["infra"]);
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "infra/profile.yaml", PROFILE_YAML);

        let manifest = manifest_with(&[("infra", "infra")], &[env("dev", "default")]);
        let errs = load_projects(dir.path(), &manifest).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, ProjectError::Template { .. })));
    }
}
