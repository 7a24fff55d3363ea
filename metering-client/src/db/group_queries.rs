use sqlx::PgPool;

use crate::db::{map_unique, GroupGraphStore, StoreError};
use crate::domain::{Group, Meter};

/// Postgres-backed `GroupGraphStore`.
///
/// Edges live in two relations:
/// - `group_group_edges (parent_id, child_id)` — group → child group
/// - `group_meter_edges (group_id, meter_id)`  — group → child meter
///
/// Both carry a unique constraint over the pair, so edge inserts use
/// `ON CONFLICT DO NOTHING` and behave as set insertion.
pub struct PgGroupGraphStore {
    pool: PgPool,
}

impl PgGroupGraphStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GroupGraphStore for PgGroupGraphStore {
    async fn insert(&self, group: &Group) -> Result<Group, StoreError> {
        if let Some(id) = group.id {
            return Err(StoreError::Precondition(format!(
                "group '{}' is already persisted with id {id}",
                group.name
            )));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO groups (name)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(&group.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "group name"))?;

        Ok(Group {
            id: Some(id),
            name: group.name.clone(),
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name
            FROM groups
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn rename(&self, id: i64, new_name: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET name = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "group name"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("group {id}")));
        }
        Ok(())
    }

    async fn add_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO group_group_edges (parent_id, child_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_group_edge(&self, parent_id: i64, child_id: i64) -> Result<(), StoreError> {
        // Deleting a missing edge affects zero rows and is not an error.
        sqlx::query(
            r#"
            DELETE FROM group_group_edges
            WHERE parent_id = $1 AND child_id = $2
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO group_meter_edges (group_id, meter_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(meter_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_meter_edge(&self, group_id: i64, meter_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM group_meter_edges
            WHERE group_id = $1 AND meter_id = $2
            "#,
        )
        .bind(group_id)
        .bind(meter_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn child_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name
            FROM groups g
            JOIN group_group_edges e ON e.child_id = g.id
            WHERE e.parent_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn child_meters(&self, group_id: i64) -> Result<Vec<Meter>, StoreError> {
        let rows = sqlx::query_as::<_, Meter>(
            r#"
            SELECT m.id, m.name, m.identifier, m.meter_type, m.enabled, m.displayable
            FROM meters m
            JOIN group_meter_edges e ON e.meter_id = m.id
            WHERE e.group_id = $1
            ORDER BY m.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn parent_groups(&self, group_id: i64) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name
            FROM groups g
            JOIN group_group_edges e ON e.parent_id = g.id
            WHERE e.child_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn has_edges(&self, group_id: i64) -> Result<bool, StoreError> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM group_group_edges WHERE parent_id = $1 OR child_id = $1)
                OR EXISTS (SELECT 1 FROM group_meter_edges WHERE group_id = $1)
            "#,
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(referenced)
    }

    async fn purge_edges(&self, group_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM group_group_edges
            WHERE parent_id = $1 OR child_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM group_meter_edges
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, group_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM group_group_edges
            WHERE parent_id = $1 OR child_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM group_meter_edges
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            DELETE FROM groups
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("group {group_id}")));
        }

        tx.commit().await?;
        Ok(())
    }
}
