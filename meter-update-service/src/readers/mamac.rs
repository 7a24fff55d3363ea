use metering_client::domain::{Meter, Reading};
use time::OffsetDateTime;

use crate::readers::{MeterReader, ReadError};

/// Polls a MAMAC device's CSV log endpoint.
///
/// The device serves `http://<identifier>/log.csv`, a headered CSV of
/// cumulative register samples:
/// - ts (RFC3339 timestamp)
/// - kwh (cumulative counter)
///
/// One reading is derived per poll: consumption is the counter delta
/// between the first and last sample, over `[first.ts, last.ts)`.
pub struct MamacReader {
    client: reqwest::Client,
}

impl MamacReader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for MamacReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MeterReader for MamacReader {
    async fn read(&self, meter: &Meter) -> Result<Reading, ReadError> {
        let meter_id = meter
            .id
            .ok_or_else(|| ReadError::Payload(format!("meter '{}' has no id", meter.name)))?;

        let url = format!("http://{}/log.csv", meter.identifier);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReadError::Fetch(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ReadError::Fetch(e.to_string()))?;

        reading_from_csv(meter_id, &body)
    }
}

/// Turns one CSV log payload into a reading. Pure, so it is testable
/// without a device on the network.
pub(crate) fn reading_from_csv(meter_id: i64, body: &str) -> Result<Reading, ReadError> {
    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| ReadError::Payload(format!("failed to read CSV headers: {e}")))?
        .clone();

    let col = |name: &str| -> Result<usize, ReadError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReadError::Payload(format!("missing column '{name}'")))
    };
    let ts_idx = col("ts")?;
    let kwh_idx = col("kwh")?;

    let mut samples: Vec<(OffsetDateTime, f64)> = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| ReadError::Payload(format!("failed to read CSV record: {e}")))?;

        let ts_str = record
            .get(ts_idx)
            .ok_or_else(|| ReadError::Payload("short CSV record".to_string()))?;
        let ts = OffsetDateTime::parse(ts_str.trim(), &time::format_description::well_known::Rfc3339)
            .map_err(|e| ReadError::Payload(format!("invalid ts '{ts_str}': {e}")))?;

        let kwh_str = record
            .get(kwh_idx)
            .ok_or_else(|| ReadError::Payload("short CSV record".to_string()))?;
        let kwh: f64 = kwh_str
            .trim()
            .parse()
            .map_err(|e| ReadError::Payload(format!("invalid kwh '{kwh_str}': {e}")))?;

        samples.push((ts, kwh));
    }

    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Err(ReadError::Payload("empty CSV log".to_string()));
    };
    if samples.len() < 2 {
        return Err(ReadError::Payload(
            "need at least two samples to form an interval".to_string(),
        ));
    }
    if last.0 <= first.0 {
        return Err(ReadError::Payload(
            "samples are not in increasing time order".to_string(),
        ));
    }
    if last.1 < first.1 {
        return Err(ReadError::Payload(format!(
            "cumulative counter decreased from {} to {}",
            first.1, last.1
        )));
    }

    Reading::new(meter_id, last.1 - first.1, first.0, last.0)
        .map_err(|e| ReadError::Payload(e.to_string()))
}
