pub mod group_queries;
pub mod meter_queries;
pub mod reading_queries;

pub use group_queries::PgGroupGraphStore;
pub use meter_queries::PgMeterRegistry;
pub use reading_queries::PgReadingStore;

use crate::domain::{Group, Meter, Reading};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Caller error (e.g. inserting an entity that already has an id).
    /// Never retried.
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate name, overlapping reading interval, cycle-creating adopt,
    /// or delete of a still-referenced group.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Maps unique-constraint violations to `Conflict`, everything else to
/// `Database`.
pub(crate) fn map_unique(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("duplicate {what}"))
        }
        _ => StoreError::Database(e),
    }
}

/// Persistence and retrieval of time-stamped consumption intervals.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persists one reading. Rejects with `Conflict` if the interval
    /// overlaps an already-persisted reading of the same meter.
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError>;

    /// All readings of one meter, ordered by interval start.
    async fn all_for_meter(&self, meter_id: i64) -> Result<Vec<Reading>, StoreError>;
}

/// CRUD and lookup for meter metadata.
#[async_trait::async_trait]
pub trait MeterRegistry: Send + Sync {
    /// Persists a new meter and returns it with its assigned id.
    /// `Precondition` if the meter already has an id, `Conflict` on a
    /// duplicate name.
    async fn insert(&self, meter: &Meter) -> Result<Meter, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Meter>, StoreError>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Meter>, StoreError>;

    /// Updates mutable metadata of a persisted meter. `NotFound` if the id
    /// does not exist.
    async fn update(&self, meter: &Meter) -> Result<(), StoreError>;

    async fn all_enabled(&self) -> Result<Vec<Meter>, StoreError>;
}

/// Row-level persistence for groups and the two edge relations
/// (group→child-group and group→child-meter). Edge inserts are set-like:
/// adding an existing edge is a no-op, as is removing a missing one.
#[async_trait::async_trait]
pub trait GroupGraphStore: Send + Sync {
    async fn insert(&self, group: &Group) -> Result<Group, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Group>, StoreError>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Group>, StoreError>;

    /// `Conflict` if the new name is taken, `NotFound` if the id is unknown.
    async fn rename(&self, id: i64, new_name: &str) -> Result<(), StoreError>;

    async fn add_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError>;

    async fn remove_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError>;

    async fn add_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError>;

    async fn remove_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError>;

    async fn child_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError>;

    async fn child_meters(&self, group_id: i64) -> Result<Vec<Meter>, StoreError>;

    async fn parent_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError>;

    /// True if any edge (in either direction, either relation) references
    /// the group.
    async fn has_edges(&self, group_id: i64) -> Result<bool, StoreError>;

    /// Removes every edge referencing the group, in both relations and both
    /// directions.
    async fn purge_edges(&self, group_id: i64) -> Result<(), StoreError>;

    /// Removes the group row and all its edges in one transaction.
    /// `NotFound` if the id is unknown.
    async fn delete(&self, group_id: i64) -> Result<(), StoreError>;
}
