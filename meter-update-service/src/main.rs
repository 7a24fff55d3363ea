use anyhow::Result;
use meter_update_service::{
    config::AppConfig,
    metrics_server, observability,
    readers::{MamacReader, TypedReader},
    update::UpdateOrchestrator,
};
use metering_client::db::{MeterRegistry, PgMeterRegistry, PgReadingStore};
use metering_client::domain::MeterType;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr);
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let registry = PgMeterRegistry::new(pool.clone());
    let readings = Arc::new(PgReadingStore::new(pool));
    let reader = Arc::new(TypedReader::new(MamacReader::new()));

    // Manual meters get their readings entered out-of-band; polling them
    // would only produce noise failures.
    let mut meters = registry.all_enabled().await?;
    meters.retain(|m| m.meter_type != MeterType::Manual);
    tracing::info!(meters = meters.len(), "starting update cycle");

    let orchestrator = UpdateOrchestrator::new(
        reader,
        readings,
        cfg.update.fanout,
        Duration::from_millis(cfg.update.fetch_timeout_ms),
    );
    let report = orchestrator.run_cycle(&meters).await;

    for outcome in report.failed() {
        if let Err(e) = &outcome.result {
            tracing::warn!(
                meter_id = outcome.meter_id,
                meter = %outcome.meter_name,
                error = %e,
                "meter not updated"
            );
        }
    }

    // Individual meter failures are part of normal operation; the process
    // only fails on infrastructure errors surfaced above via `?`.
    Ok(())
}
