//! In-memory store and reader doubles for orchestrator and hierarchy
//! tests. They honor the same contracts as the Postgres stores, so the
//! binding properties run without a database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use metering_client::db::{
    GroupGraphStore, MeterRegistry, ReadingStore, StoreError,
};
use metering_client::domain::{Group, Meter, Reading};

use crate::readers::{MeterReader, ReadError};

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Resolve(Reading),
    Reject(String),
    /// Never answers; exercises the per-fetch timeout.
    Hang,
}

#[derive(Default)]
pub(crate) struct ScriptedReader {
    scripts: BTreeMap<i64, Script>,
}

impl ScriptedReader {
    pub(crate) fn with(mut self, meter_id: i64, script: Script) -> Self {
        self.scripts.insert(meter_id, script);
        self
    }
}

#[async_trait::async_trait]
impl MeterReader for ScriptedReader {
    async fn read(&self, meter: &Meter) -> Result<Reading, ReadError> {
        let id = meter.id.expect("scripted meters always carry an id");
        match self.scripts.get(&id) {
            Some(Script::Resolve(reading)) => Ok(reading.clone()),
            Some(Script::Reject(msg)) => Err(ReadError::Fetch(msg.clone())),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Err(ReadError::Fetch("woke up from hang".to_string()))
            }
            None => Err(ReadError::Fetch(format!("no script for meter {id}"))),
        }
    }
}

#[derive(Default)]
pub(crate) struct MemReadingStore {
    rows: Mutex<Vec<Reading>>,
}

#[async_trait::async_trait]
impl ReadingStore for MemReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        if reading.start_ts >= reading.end_ts {
            return Err(StoreError::Precondition(
                "empty or inverted reading interval".to_string(),
            ));
        }

        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.meter_id == reading.meter_id && r.overlaps(reading))
        {
            return Err(StoreError::Conflict(format!(
                "reading for meter {} overlaps an existing interval",
                reading.meter_id
            )));
        }
        rows.push(reading.clone());
        Ok(())
    }

    async fn all_for_meter(&self, meter_id: i64) -> Result<Vec<Reading>, StoreError> {
        let mut rows: Vec<Reading> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.meter_id == meter_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.start_ts);
        Ok(rows)
    }
}

/// Fails every operation the way a dead connection pool would.
pub(crate) struct PoolDownReadingStore;

#[async_trait::async_trait]
impl ReadingStore for PoolDownReadingStore {
    async fn insert(&self, _reading: &Reading) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn all_for_meter(&self, _meter_id: i64) -> Result<Vec<Reading>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[derive(Default)]
pub(crate) struct MemMeterRegistry {
    inner: Mutex<MeterInner>,
}

#[derive(Default)]
struct MeterInner {
    meters: BTreeMap<i64, Meter>,
    next_id: i64,
}

#[async_trait::async_trait]
impl MeterRegistry for MemMeterRegistry {
    async fn insert(&self, meter: &Meter) -> Result<Meter, StoreError> {
        if let Some(id) = meter.id {
            return Err(StoreError::Precondition(format!(
                "meter '{}' is already persisted with id {id}",
                meter.name
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.meters.values().any(|m| m.name == meter.name) {
            return Err(StoreError::Conflict(format!(
                "duplicate meter name '{}'",
                meter.name
            )));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let persisted = Meter {
            id: Some(id),
            ..meter.clone()
        };
        inner.meters.insert(id, persisted.clone());
        Ok(persisted)
    }

    async fn get(&self, id: i64) -> Result<Option<Meter>, StoreError> {
        Ok(self.inner.lock().unwrap().meters.get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Meter>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .meters
            .values()
            .find(|m| m.name == name)
            .cloned())
    }

    async fn update(&self, meter: &Meter) -> Result<(), StoreError> {
        let id = meter
            .id
            .ok_or_else(|| StoreError::Precondition("meter has no id to update".to_string()))?;

        let mut inner = self.inner.lock().unwrap();
        if inner
            .meters
            .values()
            .any(|m| m.id != Some(id) && m.name == meter.name)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate meter name '{}'",
                meter.name
            )));
        }
        match inner.meters.get_mut(&id) {
            Some(existing) => {
                *existing = meter.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("meter {id}"))),
        }
    }

    async fn all_enabled(&self) -> Result<Vec<Meter>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .meters
            .values()
            .filter(|m| m.enabled)
            .cloned()
            .collect())
    }
}

pub(crate) struct MemGroupStore {
    inner: Mutex<GraphInner>,
    meters: std::sync::Arc<MemMeterRegistry>,
}

#[derive(Default)]
struct GraphInner {
    groups: BTreeMap<i64, String>,
    next_id: i64,
    group_edges: BTreeSet<(i64, i64)>,
    meter_edges: BTreeSet<(i64, i64)>,
}

impl MemGroupStore {
    pub(crate) fn new(meters: std::sync::Arc<MemMeterRegistry>) -> Self {
        Self {
            inner: Mutex::new(GraphInner::default()),
            meters,
        }
    }

    pub(crate) fn group_count(&self) -> usize {
        self.inner.lock().unwrap().groups.len()
    }
}

#[async_trait::async_trait]
impl GroupGraphStore for MemGroupStore {
    async fn insert(&self, group: &Group) -> Result<Group, StoreError> {
        if let Some(id) = group.id {
            return Err(StoreError::Precondition(format!(
                "group '{}' is already persisted with id {id}",
                group.name
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.groups.values().any(|n| n == &group.name) {
            return Err(StoreError::Conflict(format!(
                "duplicate group name '{}'",
                group.name
            )));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.groups.insert(id, group.name.clone());
        Ok(Group {
            id: Some(id),
            name: group.name.clone(),
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.lock().unwrap().groups.get(&id).map(|name| Group {
            id: Some(id),
            name: name.clone(),
        }))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Group>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, n)| Group {
                id: Some(id),
                name: n.clone(),
            }))
    }

    async fn rename(&self, id: i64, new_name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .groups
            .iter()
            .any(|(&other, n)| other != id && n == new_name)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate group name '{new_name}'"
            )));
        }
        match inner.groups.get_mut(&id) {
            Some(name) => {
                *name = new_name.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("group {id}"))),
        }
    }

    async fn add_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .group_edges
            .insert((parent_id, child_id));
        Ok(())
    }

    async fn remove_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .group_edges
            .remove(&(parent_id, child_id));
        Ok(())
    }

    async fn add_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .meter_edges
            .insert((group_id, meter_id));
        Ok(())
    }

    async fn remove_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .meter_edges
            .remove(&(group_id, meter_id));
        Ok(())
    }

    async fn child_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_edges
            .iter()
            .filter(|(parent, _)| *parent == group_id)
            .filter_map(|(_, child)| {
                inner.groups.get(child).map(|name| Group {
                    id: Some(*child),
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn child_meters(&self, group_id: i64) -> Result<Vec<Meter>, StoreError> {
        let ids: Vec<i64> = {
            let inner = self.inner.lock().unwrap();
            inner
                .meter_edges
                .iter()
                .filter(|(group, _)| *group == group_id)
                .map(|(_, meter)| *meter)
                .collect()
        };

        let mut meters = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(meter) = self.meters.get(id).await? {
                meters.push(meter);
            }
        }
        Ok(meters)
    }

    async fn parent_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_edges
            .iter()
            .filter(|(_, child)| *child == group_id)
            .filter_map(|(parent, _)| {
                inner.groups.get(parent).map(|name| Group {
                    id: Some(*parent),
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn has_edges(&self, group_id: i64) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_edges
            .iter()
            .any(|(parent, child)| *parent == group_id || *child == group_id)
            || inner.meter_edges.iter().any(|(group, _)| *group == group_id))
    }

    async fn purge_edges(&self, group_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .group_edges
            .retain(|(parent, child)| *parent != group_id && *child != group_id);
        inner.meter_edges.retain(|(group, _)| *group != group_id);
        Ok(())
    }

    async fn delete(&self, group_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.groups.remove(&group_id).is_none() {
            return Err(StoreError::NotFound(format!("group {group_id}")));
        }
        inner
            .group_edges
            .retain(|(parent, child)| *parent != group_id && *child != group_id);
        inner.meter_edges.retain(|(group, _)| *group != group_id);
        Ok(())
    }
}
