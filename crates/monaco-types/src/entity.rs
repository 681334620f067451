//! Resolved entities and the per-environment entity store
//!
//! A [ResolvedEntity] is produced on each successful deploy and records the
//! scalar properties later configurations may reference (always `id`, usually
//! `name`, `scope` for settings objects). The [EntityMap] is append-only:
//! entries are inserted in topological order by exactly one writer per
//! coordinate and never mutated afterwards. Its lifetime is one environment's
//! deployment phase.

use crate::coordinate::Coordinate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{RwLock, RwLockReadGuard};

/// Deploy result of one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub coordinate: Coordinate,
    /// Display name of the deployed object, where the dialect has one
    pub entity_name: String,
    /// Referenceable scalar properties
    pub properties: BTreeMap<String, Value>,
    /// True when the configuration was skipped rather than deployed
    pub skip: bool,
}

/// Append-only map from [Coordinate] to the latest [ResolvedEntity].
#[derive(Debug, Default)]
pub struct EntityMap {
    entities: RwLock<HashMap<Coordinate, ResolvedEntity>>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a deploy result. Returns false when the coordinate was already
    /// present; the orchestrator guarantees a single writer per key, so a
    /// false return indicates a scheduling bug and the first entry wins.
    pub async fn insert(&self, entity: ResolvedEntity) -> bool {
        let mut entities = self.entities.write().await;
        match entities.entry(entity.coordinate.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    pub async fn get(&self, coordinate: &Coordinate) -> Option<ResolvedEntity> {
        self.entities.read().await.get(coordinate).cloned()
    }

    pub async fn contains(&self, coordinate: &Coordinate) -> bool {
        self.entities.read().await.contains_key(coordinate)
    }

    /// Read access for resolution; holds the read lock for the guard's
    /// lifetime. Resolution is CPU-only, so guards are short-lived.
    pub async fn read(&self) -> RwLockReadGuard<'_, HashMap<Coordinate, ResolvedEntity>> {
        self.entities.read().await
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> ResolvedEntity {
        ResolvedEntity {
            coordinate: Coordinate::new("p", "t", id),
            entity_name: id.to_string(),
            properties: BTreeMap::from([("id".to_string(), Value::String(id.to_string()))]),
            skip: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let map = EntityMap::new();
        assert!(map.insert(entity("a")).await);
        let got = map.get(&Coordinate::new("p", "t", "a")).await.unwrap();
        assert_eq!(got.entity_name, "a");
        assert_eq!(map.len().await, 1);
    }

    #[tokio::test]
    async fn test_double_insert_keeps_first_entry() {
        let map = EntityMap::new();
        let mut second = entity("a");
        second.entity_name = "changed".to_string();

        assert!(map.insert(entity("a")).await);
        assert!(!map.insert(second).await);

        let got = map.get(&Coordinate::new("p", "t", "a")).await.unwrap();
        assert_eq!(got.entity_name, "a");
    }
}
