use sqlx::PgPool;

use crate::db::{map_unique, MeterRegistry, StoreError};
use crate::domain::Meter;

pub struct PgMeterRegistry {
    pool: PgPool,
}

impl PgMeterRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MeterRegistry for PgMeterRegistry {
    async fn insert(&self, meter: &Meter) -> Result<Meter, StoreError> {
        if let Some(id) = meter.id {
            return Err(StoreError::Precondition(format!(
                "meter '{}' is already persisted with id {id}",
                meter.name
            )));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO meters (name, identifier, meter_type, enabled, displayable)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&meter.name)
        .bind(&meter.identifier)
        .bind(meter.meter_type)
        .bind(meter.enabled)
        .bind(meter.displayable)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "meter name"))?;

        Ok(Meter {
            id: Some(id),
            ..meter.clone()
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Meter>, StoreError> {
        let row = sqlx::query_as::<_, Meter>(
            r#"
            SELECT id, name, identifier, meter_type, enabled, displayable
            FROM meters
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Meter>, StoreError> {
        let row = sqlx::query_as::<_, Meter>(
            r#"
            SELECT id, name, identifier, meter_type, enabled, displayable
            FROM meters
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update(&self, meter: &Meter) -> Result<(), StoreError> {
        let id = meter.id.ok_or_else(|| {
            StoreError::Precondition(format!("meter '{}' has no id to update", meter.name))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE meters
            SET name = $2,
                identifier = $3,
                meter_type = $4,
                enabled = $5,
                displayable = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&meter.name)
        .bind(&meter.identifier)
        .bind(meter.meter_type)
        .bind(meter.enabled)
        .bind(meter.displayable)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "meter name"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("meter {id}")));
        }
        Ok(())
    }

    async fn all_enabled(&self) -> Result<Vec<Meter>, StoreError> {
        let rows = sqlx::query_as::<_, Meter>(
            r#"
            SELECT id, name, identifier, meter_type, enabled, displayable
            FROM meters
            WHERE enabled
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
