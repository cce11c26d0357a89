//! Configuration management.
use crate::error::BridgeError;
use config::Config;
use serde::Deserialize;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Log filter directive, e.g. `info` or `arm_bridge=debug`.
    pub log_level: String,
    /// Control-plane connection settings.
    pub link: LinkSettings,
    /// Telemetry chart tuning.
    pub chart: ChartSettings,
}

/// Where the local control-plane process listens.
#[derive(Debug, Deserialize, Clone)]
pub struct LinkSettings {
    pub host: String,
    pub port: u16,
}

/// Tuning for the telemetry aggregation actor.
#[derive(Debug, Deserialize, Clone)]
pub struct ChartSettings {
    /// Per-channel history capacity (samples).
    pub max_dot: usize,
    /// Snapshot emission cadence in milliseconds.
    pub emit_interval_ms: u64,
    /// Default joint count until `set_joint_model` arrives.
    pub joint_model: usize,
}

impl LinkSettings {
    /// Socket address string for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Settings {
    /// Loads settings from built-in defaults, an optional TOML file under
    /// `config/`, and `ARM_BRIDGE_*` environment variables, in that order.
    pub fn new(config_name: Option<&str>) -> Result<Self, BridgeError> {
        let mut builder = Config::builder()
            .set_default("log_level", "info")?
            .set_default("link.host", "127.0.0.1")?
            .set_default("link.port", 18355_i64)?
            .set_default("chart.max_dot", 6000_i64)?
            .set_default("chart.emit_interval_ms", 200_i64)?
            .set_default("chart.joint_model", 6_i64)?;

        if let Some(name) = config_name {
            builder = builder.add_source(config::File::with_name(&format!("config/{name}")));
        }

        let s = builder
            .add_source(config::Environment::with_prefix("ARM_BRIDGE").separator("__"))
            .build()?;

        s.try_deserialize().map_err(BridgeError::Config)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            link: LinkSettings {
                host: "127.0.0.1".into(),
                port: 18355,
            },
            chart: ChartSettings {
                max_dot: 6000,
                emit_interval_ms: 200,
                joint_model: 6,
            },
        }
    }
}
