//! monaco-deploy - Dependency-graph deployment orchestration
//!
//! Turns the loaded projects into one dependency graph per environment and
//! drives it to convergence against the tenant APIs:
//!
//! 1. **Validate** the environment's configuration set; reject platform-only
//!    types without OAuth, parameter cycles and unknown references before any
//!    write.
//! 2. **Partition** the graph into weakly connected components; components
//!    are independent and run concurrently.
//! 3. **Execute** vertices in topological order, resolving each
//!    configuration just in time against the entity map and dispatching to
//!    its dialect adapter.
//! 4. **Contain failures**: a failed vertex marks its transitive descendants
//!    skipped; `continue_on_error` keeps unrelated components going.

#![deny(unsafe_code)]

mod adapters;
pub mod errors;
pub mod graph;
pub mod orchestrator;
pub mod report;
mod validate;

#[cfg(test)]
mod testing;

pub use errors::{DeployError, DeployErrorKind, EnvironmentDeploymentErrors};
pub use graph::{ConfigGraph, GraphError};
pub use orchestrator::{deploy, DeployOptions, EnvironmentClients, EnvironmentInfo};
pub use report::log_report;
