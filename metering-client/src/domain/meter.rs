use serde::{Deserialize, Serialize};

/// Polling protocol of a meter. `Manual` meters have their readings entered
/// out-of-band and are never polled by an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "meter_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MeterType {
    Mamac,
    Manual,
}

impl std::fmt::Display for MeterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mamac => write!(f, "mamac"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A monitored source of periodic consumption readings.
///
/// `id` is `None` until the meter has been persisted; `identifier` is the
/// device address handed to the reader adapter (for MAMAC meters, the host
/// serving the CSV log).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Meter {
    pub id: Option<i64>,
    pub name: String,
    pub identifier: String,
    pub meter_type: MeterType,
    pub enabled: bool,
    pub displayable: bool,
}

impl Meter {
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        meter_type: MeterType,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            identifier: identifier.into(),
            meter_type,
            enabled: true,
            displayable: true,
        }
    }
}
