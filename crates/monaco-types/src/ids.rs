//! Deterministic identifiers written into server-side objects
//!
//! Two identity contracts exist between runs of the engine and a tenant:
//!
//! - **External IDs** tag Settings 2.0 objects so a later run can recognize
//!   objects an earlier run created. They are derived from the full
//!   [Coordinate]; a legacy form derived without the project component is
//!   kept around only to migrate objects created by old releases.
//! - **Object UUIDs** address classic configurations of non-unique-name APIs,
//!   where the display name cannot serve as identity.
//!
//! Both are pure functions of their inputs. Same input yields the same output
//! forever, on every platform; changing any component changes the output.

use crate::coordinate::Coordinate;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use uuid::Uuid;

/// Prefix marking an external id as engine-owned.
pub const EXTERNAL_ID_PREFIX: &str = "monaco:";

const EXTERNAL_ID_SEPARATOR: char = '$';

/// Namespace for coordinate-derived object UUIDs. Fixed forever; changing it
/// would orphan every object created by earlier runs.
const OBJECT_NAMESPACE: Uuid = Uuid::from_u128(0xb8e91f3a_4d52_4c8e_9f3a_b1c2d4e6f801);

/// External id of a Settings 2.0 object for the given coordinate.
pub fn generate_external_id(coordinate: &Coordinate) -> String {
    let key = format!(
        "{}{sep}{}{sep}{}",
        coordinate.project,
        coordinate.config_type,
        coordinate.config_id,
        sep = EXTERNAL_ID_SEPARATOR,
    );
    format!("{EXTERNAL_ID_PREFIX}{}", hex_digest(&key))
}

/// Legacy external id, derived without the project component.
///
/// Only used to find objects created before external ids carried the project;
/// a successful upsert rewrites them to [generate_external_id] form.
pub fn generate_legacy_external_id(config_type: &str, config_id: &str) -> String {
    let key = format!("{config_type}{EXTERNAL_ID_SEPARATOR}{config_id}");
    format!("{EXTERNAL_ID_PREFIX}{}", hex_digest(&key))
}

/// Deterministic object UUID for `(project, configId)`.
///
/// PUT target when inventing a new object of a non-unique-name API or a
/// platform resource.
pub fn generate_uuid_from_coordinate(project: &str, config_id: &str) -> Uuid {
    generate_uuid_from_coordinate_with(project, config_id, true)
}

/// Variant keeping the historic behavior reachable: early releases joined the
/// components with the host path separator, producing different UUIDs on
/// Windows. `consistent_separators = false` reproduces that.
pub fn generate_uuid_from_coordinate_with(
    project: &str,
    config_id: &str,
    consistent_separators: bool,
) -> Uuid {
    let separator = if consistent_separators {
        '/'
    } else {
        std::path::MAIN_SEPARATOR
    };
    let name = format!("{project}{separator}{config_id}");
    Uuid::new_v3(&OBJECT_NAMESPACE, name.as_bytes())
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
