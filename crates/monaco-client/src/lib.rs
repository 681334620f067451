//! monaco-client - REST clients for the tenant API dialects
//!
//! Three dialects exist, each with its own identity reconciliation rules:
//!
//! - **Classic** (`/api/config/v1/<api>`): named resources. Unique-name APIs
//!   are matched by display name; non-unique-name APIs are controlled through
//!   deterministic object UUIDs.
//! - **Settings 2.0** (`/api/v2/settings/objects`): schema-driven objects
//!   recognized by an engine-owned external id, with one-time migration of
//!   legacy external ids.
//! - **Platform** (`/platform/...`): automation resources and bucket
//!   definitions behind OAuth.
//!
//! Every client is a trait with an HTTP implementation, so the deploy layer
//! can inject fakes. The [ClientSet] facade groups one client per dialect for
//! a single environment; its dry-run variant performs no network I/O.

#![deny(unsafe_code)]

pub mod auth;
pub mod automation;
pub mod bucket;
pub mod classic;
pub mod client_set;
pub mod errors;
pub mod rest;
pub mod settings;

#[cfg(test)]
mod testing;

pub use auth::{Auth, OAuthConfig, DEFAULT_TOKEN_ENDPOINT};
pub use automation::{AutomationClient, HttpAutomationClient};
pub use bucket::{BucketClient, HttpBucketClient};
pub use classic::{ClassicClient, ClassicValue, DeployedObject, HttpClassicClient};
pub use client_set::{ClientSet, ClientSetOptions, DryRunClient};
pub use errors::{ClientError, ClientResult};
pub use rest::{HttpTransport, ReqwestTransport, RestRequest, RestResponse};
pub use settings::{HttpSettingsClient, SettingsClient, SettingsObject, SettingsObjectSummary};
