pub mod mamac;

pub use mamac::MamacReader;

use metering_client::domain::{Meter, MeterType, Reading};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Network-level failure, including caller-imposed timeouts.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The device answered, but the payload could not be turned into a
    /// reading.
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("no polling protocol for {0} meters")]
    Unsupported(MeterType),
}

/// Capability that turns a meter descriptor into one consumption reading.
/// Supplied per meter type; the update orchestrator treats it as a black
/// box and isolates whatever it returns per meter.
#[async_trait::async_trait]
pub trait MeterReader: Send + Sync {
    async fn read(&self, meter: &Meter) -> Result<Reading, ReadError>;
}

/// Dispatches to the protocol-specific reader for each meter's type.
pub struct TypedReader {
    mamac: MamacReader,
}

impl TypedReader {
    pub fn new(mamac: MamacReader) -> Self {
        Self { mamac }
    }
}

#[async_trait::async_trait]
impl MeterReader for TypedReader {
    async fn read(&self, meter: &Meter) -> Result<Reading, ReadError> {
        match meter.meter_type {
            MeterType::Mamac => self.mamac.read(meter).await,
            MeterType::Manual => Err(ReadError::Unsupported(meter.meter_type)),
        }
    }
}
