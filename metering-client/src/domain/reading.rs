use time::OffsetDateTime;

/// One consumption value (kWh) over the half-open interval
/// `[start_ts, end_ts)` for one meter. Readings are immutable once
/// persisted; later intervals supersede, nothing is updated in place.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reading {
    pub meter_id: i64,
    pub value: f64,
    pub start_ts: OffsetDateTime,
    pub end_ts: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
#[error("empty or inverted reading interval: [{start_ts}, {end_ts})")]
pub struct InvalidInterval {
    pub start_ts: OffsetDateTime,
    pub end_ts: OffsetDateTime,
}

impl Reading {
    /// Builds a reading, enforcing `start_ts < end_ts`.
    pub fn new(
        meter_id: i64,
        value: f64,
        start_ts: OffsetDateTime,
        end_ts: OffsetDateTime,
    ) -> Result<Self, InvalidInterval> {
        if start_ts >= end_ts {
            return Err(InvalidInterval { start_ts, end_ts });
        }
        Ok(Self {
            meter_id,
            value,
            start_ts,
            end_ts,
        })
    }

    /// True if the two readings' intervals intersect. Half-open semantics:
    /// back-to-back intervals sharing an endpoint do not overlap.
    pub fn overlaps(&self, other: &Reading) -> bool {
        self.start_ts < other.end_ts && other.start_ts < self.end_ts
    }
}
