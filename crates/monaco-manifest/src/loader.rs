//! Manifest loading
//!
//! Reads the manifest YAML, validates it, expands grouping projects and
//! resolves every referenced environment variable. All problems are collected
//! and returned as one batch.

use crate::errors::ManifestError;
use crate::manifest::{
    Auth, AuthSecret, EnvironmentDefinition, Manifest, OAuthCredentials, ProjectDefinition,
    UrlDefinition, UrlKind,
};
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Oldest manifest version the engine still loads.
pub const MIN_MANIFEST_VERSION: Version = Version::new(1, 0, 0);
/// Newest manifest version the engine understands.
pub const MAX_MANIFEST_VERSION: Version = Version::new(1, 1, 0);

const SIMPLE_PROJECT_TYPE: &str = "simple";
const GROUPING_PROJECT_TYPE: &str = "grouping";
const URL_TYPE_VALUE: &str = "value";
const URL_TYPE_ENVIRONMENT: &str = "environment";

/// Everything needed to load a manifest
#[derive(Debug, Clone, Default)]
pub struct LoaderContext {
    /// Path of the manifest file
    pub manifest_path: PathBuf,
    /// Restrict loading to these environments. Combined with `groups` as a
    /// union; empty means all. Names that match nothing are errors.
    pub environments: Vec<String>,
    /// Restrict loading to these environment groups.
    pub groups: Vec<String>,
}

// ---- raw YAML shapes -------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawManifest {
    manifest_version: RawVersion,
    #[serde(default)]
    projects: Vec<RawProject>,
    #[serde(default)]
    environment_groups: Vec<RawGroup>,
}

/// `manifestVersion: 1.0` parses as a YAML float, `"1.0.0"` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Number(f64),
}

impl RawVersion {
    fn as_text(&self) -> String {
        match self {
            RawVersion::Text(s) => s.clone(),
            RawVersion::Number(n) => format!("{n}"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawProject {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default, rename = "type")]
    project_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawGroup {
    name: String,
    #[serde(default)]
    environments: Vec<RawEnvironment>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawEnvironment {
    name: String,
    url: RawUrl,
    auth: RawAuth,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawUrl {
    #[serde(default, rename = "type")]
    url_type: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawAuth {
    token: RawSecret,
    #[serde(default, rename = "oAuth")]
    oauth: Option<RawOAuth>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawSecret {
    #[serde(default, rename = "type")]
    secret_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawOAuth {
    client_id: RawSecret,
    client_secret: RawSecret,
    #[serde(default)]
    token_endpoint: Option<RawUrl>,
}

// ---- loading ---------------------------------------------------------------

/// Load and validate the manifest named by `context`.
pub fn load_manifest(context: &LoaderContext) -> Result<Manifest, Vec<ManifestError>> {
    let path = context.manifest_path.as_path();
    info!(
        manifest = %path.display(),
        groups = ?context.groups,
        environments = ?context.environments,
        "Loading manifest"
    );

    let raw = read_manifest_yaml(path).map_err(|e| vec![e])?;

    let mut errs = verify_manifest(path, &raw);

    let working_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let projects = match to_project_definitions(path, &working_dir, &raw.projects) {
        Ok(p) => p,
        Err(mut project_errs) => {
            errs.append(&mut project_errs);
            BTreeMap::new()
        }
    };

    let environments = match to_environments(context, &raw.environment_groups) {
        Ok(e) => e,
        Err(mut env_errs) => {
            errs.append(&mut env_errs);
            BTreeMap::new()
        }
    };

    if !errs.is_empty() {
        return Err(errs);
    }

    Ok(Manifest {
        projects,
        environments,
    })
}

fn read_manifest_yaml(path: &Path) -> Result<RawManifest, ManifestError> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if !is_yaml {
        return Err(ManifestError::load(path, "manifest file is not a yaml"));
    }

    let data = std::fs::read_to_string(path).map_err(|e| {
        ManifestError::load(path, format!("error while reading the manifest: {e}"))
    })?;

    serde_yaml::from_str(&data).map_err(|e| {
        ManifestError::load(path, format!("error during parsing the manifest: {e}"))
    })
}

fn verify_manifest(path: &Path, raw: &RawManifest) -> Vec<ManifestError> {
    let mut errs = Vec::new();

    if let Err(reason) = validate_manifest_version(&raw.manifest_version.as_text()) {
        errs.push(ManifestError::load(path, reason));
    }
    if raw.projects.is_empty() {
        errs.push(ManifestError::load(path, "no `projects` defined"));
    }
    if raw.environment_groups.is_empty() {
        errs.push(ManifestError::load(path, "no `environmentGroups` defined"));
    }

    errs
}

fn validate_manifest_version(version: &str) -> Result<(), String> {
    if version.is_empty() {
        return Err("`manifestVersion` missing".to_string());
    }

    let parsed = parse_lenient_version(version)
        .map_err(|e| format!("invalid `manifestVersion` {version:?}: {e}"))?;

    if parsed < MIN_MANIFEST_VERSION {
        return Err(format!(
            "`manifestVersion` {version} is no longer supported, min required version is {MIN_MANIFEST_VERSION}"
        ));
    }
    if parsed > MAX_MANIFEST_VERSION {
        return Err(format!(
            "`manifestVersion` {version} is not supported, max supported version is {MAX_MANIFEST_VERSION}"
        ));
    }
    Ok(())
}

/// Accepts `1`, `1.0` and `1.0.0`, padding missing components with zero.
fn parse_lenient_version(version: &str) -> Result<Version, semver::Error> {
    let padded = match version.split('.').count() {
        1 => format!("{version}.0.0"),
        2 => format!("{version}.0"),
        _ => version.to_string(),
    };
    Version::parse(&padded)
}

// ---- projects --------------------------------------------------------------

fn to_project_definitions(
    manifest_path: &Path,
    working_dir: &Path,
    raw: &[RawProject],
) -> Result<BTreeMap<String, ProjectDefinition>, Vec<ManifestError>> {
    let mut errs = Vec::new();
    let mut result: BTreeMap<String, ProjectDefinition> = BTreeMap::new();

    let mut declared = std::collections::BTreeSet::new();
    for project in raw {
        if !declared.insert(project.name.clone()) {
            errs.push(ManifestError::load(
                manifest_path,
                format!("duplicated project name `{}`", project.name),
            ));
        }
    }

    for project in raw {
        match parse_project_definition(manifest_path, working_dir, project) {
            Ok(parsed) => {
                for definition in parsed {
                    if result.contains_key(&definition.name) {
                        errs.push(ManifestError::load(
                            manifest_path,
                            format!("duplicated project name `{}`", definition.name),
                        ));
                        continue;
                    }
                    result.insert(definition.name.clone(), definition);
                }
            }
            Err(e) => errs.push(e),
        }
    }

    if errs.is_empty() {
        Ok(result)
    } else {
        Err(errs)
    }
}

fn parse_project_definition(
    manifest_path: &Path,
    working_dir: &Path,
    project: &RawProject,
) -> Result<Vec<ProjectDefinition>, ManifestError> {
    let project_error = |reason: String| ManifestError::Project {
        path: manifest_path.to_path_buf(),
        project: project.name.clone(),
        reason,
    };

    if project.name.is_empty() {
        return Err(project_error("project name is required".into()));
    }

    let project_type = project.project_type.as_deref().unwrap_or(SIMPLE_PROJECT_TYPE);
    match project_type {
        SIMPLE_PROJECT_TYPE => {
            if project.name.contains('/') || project.name.contains('\\') {
                return Err(project_error(
                    r"project name is not allowed to contain '/' or '\'".into(),
                ));
            }
            let path = project.path.clone().unwrap_or_else(|| project.name.clone());
            Ok(vec![ProjectDefinition {
                name: project.name.clone(),
                group: None,
                path: PathBuf::from(path),
            }])
        }
        GROUPING_PROJECT_TYPE => {
            let group_path = project
                .path
                .clone()
                .ok_or_else(|| project_error("grouping project requires a path".into()))?;

            let entries = std::fs::read_dir(working_dir.join(&group_path))
                .map_err(|e| project_error(format!("failed to read project dir: {e}")))?;

            let mut children = Vec::new();
            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let dir_name = entry.file_name().to_string_lossy().to_string();
                children.push(ProjectDefinition {
                    name: format!("{}.{}", project.name, dir_name),
                    group: Some(project.name.clone()),
                    path: PathBuf::from(&group_path).join(&dir_name),
                });
            }
            children.sort_by(|a, b| a.name.cmp(&b.name));

            if children.is_empty() {
                return Err(project_error(format!("no projects found in `{group_path}`")));
            }
            Ok(children)
        }
        other => Err(project_error(format!("invalid project type `{other}`"))),
    }
}

// ---- environments ----------------------------------------------------------

fn to_environments(
    context: &LoaderContext,
    groups: &[RawGroup],
) -> Result<BTreeMap<String, EnvironmentDefinition>, Vec<ManifestError>> {
    let path = context.manifest_path.as_path();
    let mut errs = Vec::new();
    let mut environments = BTreeMap::new();

    let mut group_names = std::collections::BTreeSet::new();
    let mut env_names = std::collections::BTreeSet::new();

    for (i, group) in groups.iter().enumerate() {
        if group.name.is_empty() {
            errs.push(ManifestError::load(
                path,
                format!("missing group name on index `{i}`"),
            ));
        }
        if !group_names.insert(group.name.clone()) {
            errs.push(ManifestError::load(
                path,
                format!("duplicated group name {:?}", group.name),
            ));
        }

        for (j, env) in group.environments.iter().enumerate() {
            if env.name.is_empty() {
                errs.push(ManifestError::load(
                    path,
                    format!("missing environment name in group {:?} on index `{j}`", group.name),
                ));
                continue;
            }
            if !env_names.insert(env.name.clone()) {
                errs.push(ManifestError::load(
                    path,
                    format!("duplicated environment name {:?}", env.name),
                ));
                continue;
            }

            if should_skip_env(context, &group.name, &env.name) {
                debug!(environment = %env.name, "Skipping environment not matching filters");
                continue;
            }

            match parse_environment(path, env, &group.name) {
                Ok(parsed) => {
                    environments.insert(parsed.name.clone(), parsed);
                }
                Err(mut env_errs) => errs.append(&mut env_errs),
            }
        }
    }

    // all requested filters must have matched something
    for g in &context.groups {
        if !group_names.contains(g) {
            errs.push(ManifestError::load(path, format!("requested group {g:?} not found")));
        }
    }
    for e in &context.environments {
        if !env_names.contains(e) {
            errs.push(ManifestError::load(
                path,
                format!("requested environment {e:?} not found"),
            ));
        }
    }

    if errs.is_empty() {
        Ok(environments)
    } else {
        Err(errs)
    }
}

fn should_skip_env(context: &LoaderContext, group: &str, env: &str) -> bool {
    if context.groups.is_empty() && context.environments.is_empty() {
        return false;
    }
    !(context.groups.iter().any(|g| g == group)
        || context.environments.iter().any(|e| e == env))
}

fn parse_environment(
    path: &Path,
    env: &RawEnvironment,
    group: &str,
) -> Result<EnvironmentDefinition, Vec<ManifestError>> {
    let env_error = |reason: String| ManifestError::Environment {
        path: path.to_path_buf(),
        group: group.to_string(),
        environment: env.name.clone(),
        reason,
    };

    let mut errs = Vec::new();

    let url = match parse_url_definition(&env.url) {
        Ok(u) => Some(u),
        Err(reason) => {
            errs.push(env_error(reason));
            None
        }
    };

    let auth = match parse_auth(&env.auth) {
        Ok(a) => Some(a),
        Err(reason) => {
            errs.push(env_error(format!("failed to parse auth section: {reason}")));
            None
        }
    };

    match (url, auth) {
        (Some(url), Some(auth)) if errs.is_empty() => Ok(EnvironmentDefinition {
            name: env.name.clone(),
            url,
            auth,
            group: group.to_string(),
        }),
        _ => Err(errs),
    }
}

fn parse_auth(auth: &RawAuth) -> Result<Auth, String> {
    let token = parse_auth_secret(&auth.token).map_err(|e| format!("error parsing token: {e}"))?;

    let oauth = match &auth.oauth {
        None => None,
        Some(raw) => {
            let client_id = parse_auth_secret(&raw.client_id)
                .map_err(|e| format!("failed to parse clientId: {e}"))?;
            let client_secret = parse_auth_secret(&raw.client_secret)
                .map_err(|e| format!("failed to parse clientSecret: {e}"))?;
            let token_endpoint = match &raw.token_endpoint {
                None => None,
                Some(url) => Some(
                    parse_url_definition(url)
                        .map_err(|e| format!("failed to parse tokenEndpoint: {e}"))?,
                ),
            };
            Some(OAuthCredentials {
                client_id,
                client_secret,
                token_endpoint,
            })
        }
    };

    Ok(Auth { token, oauth })
}

fn parse_auth_secret(secret: &RawSecret) -> Result<AuthSecret, String> {
    match secret.secret_type.as_deref() {
        None | Some(URL_TYPE_ENVIRONMENT) => {}
        Some(_) => return Err("type must be 'environment'".to_string()),
    }

    let name = match secret.name.as_deref() {
        Some(n) if !n.is_empty() => n,
        _ => return Err("no name given or empty".to_string()),
    };

    let value = lookup_env_var(name)?;
    Ok(AuthSecret {
        name: name.to_string(),
        value,
    })
}

fn parse_url_definition(url: &RawUrl) -> Result<UrlDefinition, String> {
    let value = match url.value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return Err("no `url` configured or value is blank".to_string()),
    };

    match url.url_type.as_deref() {
        None | Some(URL_TYPE_VALUE) => Ok(UrlDefinition {
            kind: UrlKind::Value,
            value: value.trim_end_matches('/').to_string(),
            env_var: None,
        }),
        Some(URL_TYPE_ENVIRONMENT) => {
            let resolved = lookup_env_var(value)?;
            Ok(UrlDefinition {
                kind: UrlKind::Environment,
                value: resolved.trim_end_matches('/').to_string(),
                env_var: Some(value.to_string()),
            })
        }
        Some(other) => Err(format!("{other:?} is not a valid URL type")),
    }
}

fn lookup_env_var(name: &str) -> Result<String, String> {
    match std::env::var(name) {
        Ok(v) if v.is_empty() => Err(format!(
            "environment-variable {name:?} found, but the value resolved is empty"
        )),
        Ok(v) => Ok(v),
        Err(_) => Err(format!("environment-variable {name:?} was not found")),
    }
}
