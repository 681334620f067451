//! The `deploy` command
//!
//! Load manifest and projects, filter, build clients and hand everything to
//! the orchestrator. All load and validation problems are printed as a batch
//! before the command gives up; deploy errors are reported grouped after
//! execution drains.

use crate::featureflags;
use monaco_client::{ClientSet, ClientSetOptions, OAuthConfig};
use monaco_deploy::{deploy, log_report, DeployOptions, EnvironmentClients, EnvironmentInfo};
use monaco_manifest::{
    load_manifest, load_projects, LoaderContext, Manifest, Project,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

/// Arguments of one `deploy` invocation
#[derive(Debug, Clone)]
pub struct DeployArgs {
    pub manifest: PathBuf,
    pub environments: Vec<String>,
    pub groups: Vec<String>,
    pub projects: Vec<String>,
    pub continue_on_error: bool,
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("error while loading manifest")]
    ManifestLoad,

    #[error("error while loading projects")]
    ProjectLoad,

    #[error("no project with names {0:?} found")]
    UnknownProjects(Vec<String>),

    #[error("failed to create API clients for environment {environment:?}: {reason}")]
    Clients { environment: String, reason: String },

    #[error("errors during {0}")]
    Deploy(&'static str),
}

pub async fn deploy_configs(args: DeployArgs, cancel: watch::Receiver<bool>) -> Result<(), CliError> {
    let manifest_path = absolute_path(&args.manifest);
    let manifest = load_manifest(&LoaderContext {
        manifest_path: manifest_path.clone(),
        environments: args.environments.clone(),
        groups: args.groups.clone(),
    })
    .map_err(|errors| {
        for e in &errors {
            error!("{e}");
        }
        CliError::ManifestLoad
    })?;

    let working_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let projects = load_projects(&working_dir, &manifest).map_err(|errors| {
        for e in &errors {
            error!("{e}");
        }
        CliError::ProjectLoad
    })?;

    let projects = filter_projects(projects, &args.projects, &manifest.environment_names())?;

    info!(
        projects = projects.len(),
        environments = manifest.environments.len(),
        dry_run = args.dry_run,
        "Deploying"
    );

    let options = deploy_options(&args);
    let clients = create_clients(&manifest, args.dry_run)?;

    match deploy(&projects, clients, options, cancel).await {
        Ok(()) => {
            info!("{} finished without errors", operation_noun(args.dry_run));
            Ok(())
        }
        Err(errors) => {
            log_report(&errors);
            Err(CliError::Deploy(operation_noun(args.dry_run)))
        }
    }
}

fn operation_noun(dry_run: bool) -> &'static str {
    if dry_run {
        "validation"
    } else {
        "deployment"
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn deploy_options(args: &DeployArgs) -> DeployOptions {
    DeployOptions {
        continue_on_error: args.continue_on_error,
        dry_run: args.dry_run,
        intra_component_parallelism: featureflags::graph_deploy_parallel().enabled(),
        consistent_uuid_generation: featureflags::consistent_uuid_generation().enabled(),
        ..DeployOptions::default()
    }
}

fn create_clients(manifest: &Manifest, dry_run: bool) -> Result<EnvironmentClients, CliError> {
    let mut clients = EnvironmentClients::new();

    for environment in manifest.environments.values() {
        let info = EnvironmentInfo {
            name: environment.name.clone(),
            group: environment.group.clone(),
            platform: environment.is_platform(),
        };

        let set = if dry_run {
            ClientSet::dry_run()
        } else {
            let oauth = environment.auth.oauth.as_ref().map(|o| OAuthConfig {
                client_id: o.client_id.value.clone(),
                client_secret: o.client_secret.value.clone(),
                token_endpoint: o.token_endpoint.as_ref().map(|u| u.value.clone()),
            });
            ClientSet::create(
                &environment.url.value,
                &environment.auth.token.value,
                oauth,
                ClientSetOptions {
                    migrate_legacy_external_ids: featureflags::legacy_external_id_migration()
                        .enabled(),
                    ..ClientSetOptions::default()
                },
            )
            .map_err(|e| CliError::Clients {
                environment: environment.name.clone(),
                reason: e.to_string(),
            })?
        };

        clients.push((info, set));
    }

    Ok(clients)
}

/// Restrict the loaded projects to the requested ones, pulling in their
/// cross-project dependencies for the selected environments. Requested names
/// match a project id or a grouping parent.
fn filter_projects(
    projects: Vec<Project>,
    requested: &[String],
    environments: &[String],
) -> Result<Vec<Project>, CliError> {
    if requested.is_empty() {
        return Ok(projects);
    }

    let mut selected: Vec<String> = Vec::new();
    let mut matched: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for project in &projects {
        if requested.iter().any(|r| r == &project.id) {
            matched.insert(project.id.as_str());
            selected.push(project.id.clone());
        } else if let Some(group) = &project.group_id {
            if requested.iter().any(|r| r == group) {
                matched.insert(group.as_str());
                selected.push(project.id.clone());
            }
        }
    }

    let unknown: Vec<String> = requested
        .iter()
        .filter(|r| !matched.contains(r.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(CliError::UnknownProjects(unknown));
    }

    // transitive closure over the dependency map of the selected environments
    let by_id: std::collections::HashMap<&str, &Project> =
        projects.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut included: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    let mut to_check = selected;

    while let Some(current) = to_check.pop() {
        if !included.insert(current.clone()) {
            continue;
        }
        let Some(project) = by_id.get(current.as_str()) else {
            return Err(CliError::UnknownProjects(vec![current]));
        };
        for environment in environments {
            if let Some(deps) = project.dependencies.get(environment) {
                to_check.extend(deps.iter().cloned());
            }
        }
    }

    Ok(projects
        .into_iter()
        .filter(|p| included.contains(&p.id))
        .collect())
}
