//! Error taxonomy for the bus and command layer (spec §7).

use std::fmt;

/// Carried in a `102` response's `error` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VacuumError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for VacuumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vacuum error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for VacuumError {}

/// Errors from [`crate::DeviceBus::send_command`] and friends.
#[derive(Debug)]
pub enum BusError {
    /// The device reported an error for this request.
    Vacuum { method: String, source: VacuumError },
    /// No response arrived before the deadline.
    TimedOut { method: String },
    /// The bus was shut down (or disconnected) while the request was pending.
    Disconnected,
    /// An optional rate-limit wrapper refused to let this call through.
    BackoffRefused,
    /// MQTT transport failure.
    Mqtt(rumqttc::v5::ClientError),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vacuum { method, source } => write!(f, "{method}: {source}"),
            Self::TimedOut { method } => write!(f, "{method}: timed out"),
            Self::Disconnected => write!(f, "bus disconnected"),
            Self::BackoffRefused => write!(f, "retry budget exhausted"),
            Self::Mqtt(e) => write!(f, "mqtt error: {e}"),
        }
    }
}

impl std::error::Error for BusError {}

impl From<rumqttc::v5::ClientError> for BusError {
    fn from(e: rumqttc::v5::ClientError) -> Self { Self::Mqtt(e) }
}
