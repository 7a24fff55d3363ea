use sqlx::PgPool;

use crate::db::{ReadingStore, StoreError};
use crate::domain::Reading;

/// Postgres-backed `ReadingStore`. The pool is injected by the caller; the
/// store never reaches for ambient connection state.
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        if reading.start_ts >= reading.end_ts {
            return Err(StoreError::Precondition(format!(
                "empty or inverted reading interval: [{}, {})",
                reading.start_ts, reading.end_ts
            )));
        }

        // Overlap check and insert commit or roll back together. This does
        // not serialize racing cycles for the same meter; callers must not
        // run two update cycles for one meter concurrently.
        let mut tx = self.pool.begin().await?;

        let overlapping: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM readings
                WHERE meter_id = $1
                  AND start_ts < $3
                  AND end_ts   > $2
            )
            "#,
        )
        .bind(reading.meter_id)
        .bind(reading.start_ts)
        .bind(reading.end_ts)
        .fetch_one(&mut *tx)
        .await?;

        if overlapping {
            return Err(StoreError::Conflict(format!(
                "reading [{}, {}) for meter {} overlaps an existing interval",
                reading.start_ts, reading.end_ts, reading.meter_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO readings (meter_id, value, start_ts, end_ts)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reading.meter_id)
        .bind(reading.value)
        .bind(reading.start_ts)
        .bind(reading.end_ts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn all_for_meter(&self, meter_id: i64) -> Result<Vec<Reading>, StoreError> {
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT
                meter_id,
                value,
                start_ts,
                end_ts
            FROM readings
            WHERE meter_id = $1
            ORDER BY start_ts
            "#,
        )
        .bind(meter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
