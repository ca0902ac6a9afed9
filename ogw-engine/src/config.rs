//! Engine configuration
//!
//! Every field has a default matching the reference polling behaviour, so an
//! empty JSON object is a valid configuration.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// (De)serialize a `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Timing parameters of one adapter engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the feature (scaling / sharpening / RSR) cycle
    #[serde(rename = "update_interval_ms", with = "millis")]
    pub update_interval: Duration,

    /// Period of the telemetry cycle
    #[serde(rename = "telemetry_interval_ms", with = "millis")]
    pub telemetry_interval: Duration,

    /// How long a single native call may run before its result is abandoned
    #[serde(rename = "execute_timeout_ms", with = "millis")]
    pub execute_timeout: Duration,

    /// Delay between support probes while a driver is coming up
    #[serde(rename = "probe_interval_ms", with = "millis")]
    pub probe_interval: Duration,

    /// Total time spent probing for support before reporting unsupported
    #[serde(rename = "probe_window_ms", with = "millis")]
    pub probe_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(2000),
            telemetry_interval: Duration::from_millis(1000),
            execute_timeout: Duration::from_secs(5),
            probe_interval: Duration::from_millis(250),
            probe_window: Duration::from_secs(3),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a configuration from JSON
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("update_interval", self.update_interval),
            ("telemetry_interval", self.telemetry_interval),
            ("execute_timeout", self.execute_timeout),
            ("probe_interval", self.probe_interval),
            ("probe_window", self.probe_window),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, d)| d.is_zero()) {
            return Err(EngineError::InvalidConfig(format!("{} must be non-zero", name)));
        }
        if self.probe_interval > self.probe_window {
            return Err(EngineError::InvalidConfig(
                "probe_interval must not exceed probe_window".to_string(),
            ));
        }
        Ok(())
    }
}
