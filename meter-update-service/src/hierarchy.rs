use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use metering_client::db::{GroupGraphStore, MeterRegistry, StoreError};
use metering_client::domain::{Group, Meter};

/// Graph mutations and queries over the group DAG.
///
/// Groups form a directed acyclic graph: a group's children are meters
/// and/or other groups, and any node may have several parents. The one
/// place the DAG invariant is enforced is `adopt_group`; every other
/// mutation assumes it already holds. Descendant queries are explicit
/// breadth-first walks with a visited set, so diamonds are visited once
/// and even a corrupted cyclic store cannot loop them forever.
pub struct GroupHierarchyEngine<G, M> {
    groups: Arc<G>,
    meters: Arc<M>,
}

impl<G, M> GroupHierarchyEngine<G, M>
where
    G: GroupGraphStore,
    M: MeterRegistry,
{
    pub fn new(groups: Arc<G>, meters: Arc<M>) -> Self {
        Self { groups, meters }
    }

    /// Persists a new group. `Precondition` if the group already carries an
    /// id, `Conflict` on a duplicate name.
    pub async fn insert_group(&self, group: Group) -> Result<Group, StoreError> {
        self.groups.insert(&group).await
    }

    pub async fn get_group(&self, group_id: i64) -> Result<Option<Group>, StoreError> {
        self.groups.get(group_id).await
    }

    pub async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>, StoreError> {
        self.groups.get_by_name(name).await
    }

    /// Adds a parent → child-group edge.
    ///
    /// `NotFound` if either group is absent; `Conflict` if the edge would
    /// close a cycle, i.e. the parent is the child itself or already one of
    /// its deep descendants. Adopting an existing child again is a no-op.
    pub async fn adopt_group(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        self.require_group(parent_id).await?;
        self.require_group(child_id).await?;

        if parent_id == child_id {
            return Err(StoreError::Conflict(format!(
                "group {parent_id} cannot adopt itself"
            )));
        }
        let below_child = self.deep_group_ids(child_id).await?;
        if below_child.contains(&parent_id) {
            return Err(StoreError::Conflict(format!(
                "group {parent_id} is a descendant of group {child_id}; adopting it would create a cycle"
            )));
        }

        self.groups.add_group_edge(parent_id, child_id).await?;
        tracing::debug!(parent_id, child_id, "group adopted");
        Ok(())
    }

    /// Adds a group → meter edge. `NotFound` if either side is absent.
    pub async fn adopt_meter(&self, parent_id: i64, meter_id: i64) -> Result<(), StoreError> {
        self.require_group(parent_id).await?;
        if self.meters.get(meter_id).await?.is_none() {
            return Err(StoreError::NotFound(format!("meter {meter_id}")));
        }

        self.groups.add_meter_edge(parent_id, meter_id).await?;
        tracing::debug!(parent_id, meter_id, "meter adopted");
        Ok(())
    }

    /// Removes a parent → child-group edge. Removing an absent edge is a
    /// no-op.
    pub async fn disown_group(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        self.groups.remove_group_edge(parent_id, child_id).await
    }

    /// Removes a group → meter edge. Removing an absent edge is a no-op.
    pub async fn disown_meter(&self, parent_id: i64, meter_id: i64) -> Result<(), StoreError> {
        self.groups.remove_meter_edge(parent_id, meter_id).await
    }

    /// Renames a group. `Conflict` if the name is taken.
    pub async fn rename_group(&self, group_id: i64, new_name: &str) -> Result<(), StoreError> {
        self.groups.rename(group_id, new_name).await
    }

    /// One-hop child groups.
    pub async fn immediate_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        self.groups.child_groups(group_id).await
    }

    /// One-hop child meters.
    pub async fn immediate_meters(&self, group_id: i64) -> Result<Vec<Meter>, StoreError> {
        self.groups.child_meters(group_id).await
    }

    /// One-hop parent groups. A group may have zero or many.
    pub async fn parents(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        self.groups.parent_groups(group_id).await
    }

    /// Full transitive closure of descendant groups, each appearing once
    /// regardless of how many paths reach it. The starting group itself is
    /// not part of the result.
    pub async fn deep_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        let mut visited: HashSet<i64> = HashSet::from([group_id]);
        let mut queue: VecDeque<i64> = VecDeque::from([group_id]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for child in self.groups.child_groups(current).await? {
                let Some(child_id) = child.id else {
                    continue;
                };
                if visited.insert(child_id) {
                    queue.push_back(child_id);
                    found.push(child);
                }
            }
        }

        found.sort_by_key(|g| g.id);
        Ok(found)
    }

    /// All meters reachable from the group: its own child meters plus those
    /// of every deep descendant group, deduplicated by meter id.
    pub async fn deep_meters(&self, group_id: i64) -> Result<Vec<Meter>, StoreError> {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut meters = Vec::new();

        let mut group_ids = vec![group_id];
        group_ids.extend(self.deep_groups(group_id).await?.iter().filter_map(|g| g.id));

        for gid in group_ids {
            for meter in self.groups.child_meters(gid).await? {
                let Some(meter_id) = meter.id else {
                    continue;
                };
                if seen.insert(meter_id) {
                    meters.push(meter);
                }
            }
        }

        meters.sort_by_key(|m| m.id);
        Ok(meters)
    }

    /// Deletes a group. If any edge still references it, `cascade` must be
    /// set or the call fails with `Conflict`; with cascade the edges are
    /// purged in both directions together with the row.
    pub async fn delete_group(&self, group_id: i64, cascade: bool) -> Result<(), StoreError> {
        self.require_group(group_id).await?;

        if !cascade && self.groups.has_edges(group_id).await? {
            return Err(StoreError::Conflict(format!(
                "group {group_id} is still referenced by parents, child groups, or meters"
            )));
        }

        self.groups.delete(group_id).await?;
        tracing::info!(group_id, cascade, "group deleted");
        Ok(())
    }

    async fn require_group(&self, group_id: i64) -> Result<Group, StoreError> {
        self.groups
            .get(group_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))
    }

    async fn deep_group_ids(&self, group_id: i64) -> Result<HashSet<i64>, StoreError> {
        Ok(self
            .deep_groups(group_id)
            .await?
            .iter()
            .filter_map(|g| g.id)
            .collect())
    }
}
