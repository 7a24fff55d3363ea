use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{stream, StreamExt};
use metering_client::db::{ReadingStore, StoreError};
use metering_client::domain::Meter;

use crate::readers::{MeterReader, ReadError};

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("invalid reading: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct MeterOutcome {
    pub meter_id: i64,
    pub meter_name: String,
    pub result: Result<(), UpdateError>,
}

/// Per-meter breakdown of one update cycle. A cycle always completes; this
/// is "at-least-N-successes, failures enumerated", never all-or-nothing.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<MeterOutcome>,
}

impl CycleReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &MeterOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn outcome_for(&self, meter_id: i64) -> Option<&MeterOutcome> {
        self.outcomes.iter().find(|o| o.meter_id == meter_id)
    }
}

/// Drives one ingestion cycle over a set of meters.
///
/// Fetches run concurrently up to `fanout`, each wrapped in its own
/// timeout. Every meter's outcome is independent: a failed fetch, a
/// rejected reading, or a failed insert is reported for that meter and
/// never aborts or rolls back the rest of the batch.
pub struct UpdateOrchestrator<R, S> {
    reader: Arc<R>,
    readings: Arc<S>,
    fanout: usize,
    fetch_timeout: Duration,
}

impl<R, S> UpdateOrchestrator<R, S>
where
    R: MeterReader + 'static,
    S: ReadingStore + 'static,
{
    pub fn new(reader: Arc<R>, readings: Arc<S>, fanout: usize, fetch_timeout: Duration) -> Self {
        Self {
            reader,
            readings,
            fanout: fanout.max(1),
            fetch_timeout,
        }
    }

    pub async fn run_cycle(&self, meters: &[Meter]) -> CycleReport {
        let started = Instant::now();

        let outcomes = stream::iter(meters.to_vec())
            .map(|meter| {
                let reader = Arc::clone(&self.reader);
                let readings = Arc::clone(&self.readings);
                let fetch_timeout = self.fetch_timeout;
                async move { Self::update_one(reader, readings, fetch_timeout, meter).await }
            })
            .buffer_unordered(self.fanout)
            .collect::<Vec<_>>()
            .await;

        let report = CycleReport { outcomes };

        metrics::histogram!("update_cycle_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            meters = report.outcomes.len(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "update cycle finished"
        );

        report
    }

    async fn update_one(
        reader: Arc<R>,
        readings: Arc<S>,
        fetch_timeout: Duration,
        meter: Meter,
    ) -> MeterOutcome {
        let result = Self::fetch_and_persist(&reader, &readings, fetch_timeout, &meter).await;

        match &result {
            Ok(()) => {
                metrics::counter!("meter_update_success_total").increment(1);
                tracing::debug!(meter = %meter.name, "meter updated");
            }
            Err(e) => {
                metrics::counter!("meter_update_failure_total").increment(1);
                tracing::warn!(meter = %meter.name, error = %e, "meter update failed");
            }
        }

        MeterOutcome {
            meter_id: meter.id.unwrap_or(-1),
            meter_name: meter.name,
            result,
        }
    }

    async fn fetch_and_persist(
        reader: &R,
        readings: &S,
        fetch_timeout: Duration,
        meter: &Meter,
    ) -> Result<(), UpdateError> {
        let meter_id = meter.id.ok_or_else(|| {
            UpdateError::Validation(format!("meter '{}' has no id", meter.name))
        })?;

        // A timed-out fetch is indistinguishable from any other rejected
        // fetch: the meter is skipped, the cycle continues.
        let reading = tokio::time::timeout(fetch_timeout, reader.read(meter))
            .await
            .map_err(|_| {
                ReadError::Fetch(format!("timed out after {}ms", fetch_timeout.as_millis()))
            })??;

        if reading.meter_id != meter_id {
            return Err(UpdateError::Validation(format!(
                "adapter returned a reading for meter {} while updating meter {meter_id}",
                reading.meter_id
            )));
        }
        if reading.start_ts >= reading.end_ts {
            return Err(UpdateError::Validation(format!(
                "empty or inverted interval [{}, {})",
                reading.start_ts, reading.end_ts
            )));
        }
        if !reading.value.is_finite() || reading.value < 0.0 {
            return Err(UpdateError::Validation(format!(
                "consumption must be a non-negative finite number, got {}",
                reading.value
            )));
        }

        // Each insert runs in its own store transaction, so one meter's
        // persistence failure cannot corrupt another meter's commit.
        readings.insert(&reading).await?;
        Ok(())
    }
}
