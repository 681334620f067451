//! The deployment orchestrator
//!
//! Per environment: validate, build the dependency graph, partition it into
//! weakly connected components and execute. Environments deploy concurrently,
//! components within an environment deploy concurrently, and vertices inside
//! a component run in topological order, sequentially by default or gated on
//! their in-degree when intra-component parallelism is enabled.
//!
//! Ordering guarantee: a successor never observes the entity map before its
//! predecessor's upsert has returned success, because the entity is inserted
//! before the vertex is reported complete.
//!
//! Failure containment: a failed vertex marks its transitive descendants as
//! skipped. Without `continue_on_error`, the first failure also stops every
//! component from launching further vertices; in-flight work drains.

use crate::adapters::deploy_config;
use crate::errors::{DeployError, DeployErrorKind, EnvironmentDeploymentErrors};
use crate::graph::{ConfigGraph, GraphError};
use crate::validate::validate_environment;
use monaco_client::ClientSet;
use monaco_manifest::Project;
use monaco_types::{resolve_skipped, Config, Coordinate, EntityMap};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Identity of one target environment
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub name: String,
    pub group: String,
    /// Whether the environment carries OAuth (platform) credentials
    pub platform: bool,
}

/// Environments to deploy to, each with its dialect clients
pub type EnvironmentClients = Vec<(EnvironmentInfo, ClientSet)>;

/// Execution options, snapshotted once at startup
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Keep deploying independent components after a failure
    pub continue_on_error: bool,
    /// Validation mode; callers pair this with [ClientSet::dry_run] clients
    pub dry_run: bool,
    /// Gate vertices on their in-degree instead of running a component
    /// sequentially
    pub intra_component_parallelism: bool,
    /// Bound on concurrently deploying configurations per environment
    pub max_parallel: usize,
    /// Join coordinate UUID inputs with `/` on every platform
    pub consistent_uuid_generation: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            dry_run: false,
            intra_component_parallelism: false,
            max_parallel: 4,
            consistent_uuid_generation: true,
        }
    }
}

/// Deploy every project to every environment.
///
/// Environments are independent and run concurrently. Returns the aggregated
/// per-environment errors when anything failed.
pub async fn deploy(
    projects: &[Project],
    clients: EnvironmentClients,
    options: DeployOptions,
    cancel: watch::Receiver<bool>,
) -> Result<(), EnvironmentDeploymentErrors> {
    let mut join = JoinSet::new();

    for (environment, client_set) in clients {
        let configs = flatten_configs(projects, &environment.name);
        let options = options.clone();
        let cancel = cancel.clone();
        join.spawn(async move {
            deploy_environment(environment, configs, client_set, options, cancel).await
        });
    }

    let mut all = EnvironmentDeploymentErrors::default();
    while let Some(result) = join.join_next().await {
        match result {
            Ok(errors) => all.extend(errors),
            Err(e) => error!(error = %e, "Environment deployment task aborted"),
        }
    }

    if all.is_empty() {
        Ok(())
    } else {
        Err(all)
    }
}

/// All configurations of every project targeting `environment`.
fn flatten_configs(projects: &[Project], environment: &str) -> Vec<Config> {
    let mut configs: Vec<Config> = projects
        .iter()
        .filter_map(|p| p.configs.get(environment))
        .flat_map(|per_type| per_type.values())
        .flatten()
        .cloned()
        .collect();
    configs.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
    configs
}

#[instrument(skip_all, fields(environment = %environment.name, dry_run = options.dry_run))]
async fn deploy_environment(
    environment: EnvironmentInfo,
    configs: Vec<Config>,
    clients: ClientSet,
    options: DeployOptions,
    cancel: watch::Receiver<bool>,
) -> Vec<DeployError> {
    info!(configs = configs.len(), "Deploying configurations");

    let validation_errors = validate_environment(&configs, &environment);
    if !validation_errors.is_empty() {
        warn!(
            errors = validation_errors.len(),
            "Validation failed, aborting environment before any write"
        );
        return validation_errors;
    }

    let graph = match ConfigGraph::build(configs) {
        Ok(graph) => graph,
        Err(e) => return vec![graph_error(&environment, e)],
    };
    if let Err(e) = graph.validate_acyclic() {
        return vec![graph_error(&environment, e)];
    }

    let options = Arc::new(options);
    let semaphore = Arc::new(Semaphore::new(options.max_parallel.max(1)));
    let context = ComponentContext {
        graph: Arc::new(graph),
        clients,
        entity_map: Arc::new(EntityMap::new()),
        environment: Arc::new(environment),
        options,
        semaphore,
        cancel,
        stop: {
            let (tx, rx) = watch::channel(false);
            (Arc::new(tx), rx)
        },
    };

    let components = context.graph.components();
    debug!(components = components.len(), "Executing dependency graph");

    let mut join: JoinSet<Vec<DeployError>> = JoinSet::new();
    for component in components {
        let context = context.clone();
        join.spawn(async move { run_component(component, context).await });
    }

    let mut errors = Vec::new();
    while let Some(result) = join.join_next().await {
        match result {
            Ok(mut component_errors) => errors.append(&mut component_errors),
            Err(e) => error!(error = %e, "Component task aborted"),
        }
    }

    let deployed = context.entity_map.len().await;
    if errors.is_empty() {
        info!(deployed, "Environment finished without errors");
    } else {
        warn!(deployed, errors = errors.len(), "Environment finished with errors");
    }
    errors
}

fn graph_error(environment: &EnvironmentInfo, error: GraphError) -> DeployError {
    match error {
        GraphError::DuplicateCoordinate(coordinate) => DeployError::new(
            coordinate.clone(),
            &environment.name,
            &environment.group,
            DeployErrorKind::Validation(format!("duplicate coordinate {coordinate}")),
        ),
        GraphError::Cycle(cycle) => DeployError::new(
            cycle.first().cloned().unwrap_or_else(|| Coordinate::new("", "", "")),
            &environment.name,
            &environment.group,
            DeployErrorKind::DependencyCycle { cycle },
        ),
    }
}

#[derive(Clone)]
struct ComponentContext {
    graph: Arc<ConfigGraph>,
    clients: ClientSet,
    entity_map: Arc<EntityMap>,
    environment: Arc<EnvironmentInfo>,
    options: Arc<DeployOptions>,
    semaphore: Arc<Semaphore>,
    cancel: watch::Receiver<bool>,
    stop: (Arc<watch::Sender<bool>>, watch::Receiver<bool>),
}

impl ComponentContext {
    fn halted(&self) -> bool {
        *self.cancel.borrow() || *self.stop.1.borrow()
    }

    fn request_stop(&self) {
        if !self.options.continue_on_error {
            let _ = self.stop.0.send(true);
        }
    }

    fn skip_error(&self, vertex: usize, failed: &Coordinate) -> DeployError {
        let config = self.graph.config(vertex);
        DeployError::new(
            config.coordinate.clone(),
            &self.environment.name,
            &self.environment.group,
            DeployErrorKind::SkippedDueToAncestor {
                failed: failed.clone(),
            },
        )
    }
}

async fn run_component(component: Vec<usize>, context: ComponentContext) -> Vec<DeployError> {
    if context.options.intra_component_parallelism {
        run_component_parallel(component, context).await
    } else {
        run_component_sequential(component, context).await
    }
}

async fn run_component_sequential(
    order: Vec<usize>,
    context: ComponentContext,
) -> Vec<DeployError> {
    let mut errors = Vec::new();
    // vertex -> coordinate of the transitive root failure
    let mut failed: HashMap<usize, Coordinate> = HashMap::new();

    for vertex in order {
        let failed_ancestor = context
            .graph
            .predecessors(vertex)
            .iter()
            .find_map(|p| failed.get(p))
            .cloned();

        if let Some(root) = failed_ancestor {
            errors.push(context.skip_error(vertex, &root));
            failed.insert(vertex, root);
            continue;
        }

        if context.halted() {
            continue;
        }

        match run_vertex(vertex, &context).await {
            Ok(()) => {}
            Err(e) => {
                failed.insert(vertex, context.graph.config(vertex).coordinate.clone());
                errors.push(e);
                context.request_stop();
            }
        }
    }

    errors
}

async fn run_component_parallel(order: Vec<usize>, context: ComponentContext) -> Vec<DeployError> {
    let members: HashSet<usize> = order.iter().copied().collect();
    let mut in_degree: HashMap<usize, usize> = members
        .iter()
        .map(|&v| {
            let degree = context
                .graph
                .predecessors(v)
                .iter()
                .filter(|&&p| members.contains(&p))
                .count();
            (v, degree)
        })
        .collect();

    let mut ready: BTreeSet<(Coordinate, usize)> = order
        .iter()
        .copied()
        .filter(|v| in_degree[v] == 0)
        .map(|v| (context.graph.config(v).coordinate.clone(), v))
        .collect();

    let mut failed: HashMap<usize, Coordinate> = HashMap::new();
    let mut errors = Vec::new();
    let mut running: JoinSet<(usize, Result<(), DeployError>)> = JoinSet::new();

    loop {
        // launch (or cascade-skip) everything currently ready
        while let Some((coordinate, vertex)) = ready.iter().next().cloned() {
            ready.remove(&(coordinate, vertex));

            let failed_ancestor = context
                .graph
                .predecessors(vertex)
                .iter()
                .find_map(|p| failed.get(p))
                .cloned();

            if let Some(root) = failed_ancestor {
                errors.push(context.skip_error(vertex, &root));
                failed.insert(vertex, root);
                release_successors(&context, vertex, &mut in_degree, &mut ready);
                continue;
            }

            if context.halted() {
                continue;
            }

            let context = context.clone();
            running.spawn(async move {
                let result = run_vertex(vertex, &context).await;
                (vertex, result)
            });
        }

        match running.join_next().await {
            None => break,
            Some(Ok((vertex, result))) => {
                if let Err(e) = result {
                    failed.insert(vertex, context.graph.config(vertex).coordinate.clone());
                    errors.push(e);
                    context.request_stop();
                }
                release_successors(&context, vertex, &mut in_degree, &mut ready);
            }
            Some(Err(e)) => error!(error = %e, "Vertex task aborted"),
        }
    }

    errors
}

fn release_successors(
    context: &ComponentContext,
    vertex: usize,
    in_degree: &mut HashMap<usize, usize>,
    ready: &mut BTreeSet<(Coordinate, usize)>,
) {
    for &succ in context.graph.successors(vertex) {
        if let Some(degree) = in_degree.get_mut(&succ) {
            *degree -= 1;
            if *degree == 0 {
                ready.insert((context.graph.config(succ).coordinate.clone(), succ));
            }
        }
    }
}

/// Deploy one vertex and publish its entity. The entity is inserted before
/// this function returns, so successors always observe it.
async fn run_vertex(vertex: usize, context: &ComponentContext) -> Result<(), DeployError> {
    let config = context.graph.config(vertex);

    if config.skip {
        debug!(coordinate = %config.coordinate, "Configuration is marked skip, publishing placeholder");
        context.entity_map.insert(resolve_skipped(config)).await;
        return Ok(());
    }

    let cancelled_error = || {
        DeployError::new(
            config.coordinate.clone(),
            &context.environment.name,
            &context.environment.group,
            DeployErrorKind::Cancelled,
        )
    };

    let _permit = context
        .semaphore
        .acquire()
        .await
        .map_err(|_| cancelled_error())?;

    if *context.cancel.borrow() {
        return Err(cancelled_error());
    }

    tokio::select! {
        _ = cancellation(context.cancel.clone()) => Err(cancelled_error()),
        result = deploy_config(&context.clients, config, &context.entity_map, &context.options) => {
            let entity = result?;
            info!(
                coordinate = %config.coordinate,
                id = %entity.properties.get(monaco_types::ID_PROPERTY)
                    .and_then(|v| v.as_str())
                    .unwrap_or("-"),
                "Deployed configuration"
            );
            context.entity_map.insert(entity).await;
            Ok(())
        }
    }
}

/// Resolves when the cancel signal fires; pends forever when the sender is
/// gone (no cancellation can ever arrive).
async fn cancellation(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
