//! Command façade over the multiplexer.
//!
//! [`ArmCommands`] gives UI collaborators the panel's named commands without
//! hand-building payloads at every call site. Every call awaits the
//! correlated response and surfaces non-zero codes as
//! [`crate::error::BridgeError::Command`]. A bounded in-memory history
//! records the last 100 commands issued.

use crate::error::Result;
use crate::link::mux::ArmLink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Commands remembered for the console history.
const HISTORY_CAPACITY: usize = 100;

/// Observation sampling rate. Six-axis force/torque sensing caps at 200 Hz,
/// everything else reports at 250 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleRate {
    /// 200 samples per second.
    #[serde(rename = "hz200")]
    Hz200,
    /// 250 samples per second.
    #[serde(rename = "hz250")]
    Hz250,
}

/// Observation run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObserveMode {
    /// Chart one live field.
    #[serde(rename = "observer")]
    Observer,
    /// Compare a planned field against its measured counterpart.
    #[serde(rename = "compare")]
    Compare,
}

/// Parameters for starting an observation run.
#[derive(Debug, Clone)]
pub struct ObserveParams {
    /// Run mode; picks the wire command.
    pub mode: ObserveMode,
    /// Field or analysis pair to observe, by panel name.
    pub observe_type: String,
    /// Restrict reporting to one axis, `None` for all.
    pub joint_dir: Option<usize>,
    /// Sampling rate.
    pub hz: SampleRate,
    /// `true` reports angular values in radians.
    pub use_rad: bool,
    /// Run length in seconds before the control plane stops on its own.
    pub timeout_secs: u64,
    /// Ask the control plane to record a CSV alongside.
    pub csv: bool,
}

impl ObserveParams {
    fn payload(&self) -> Value {
        json!({
            "mode": self.mode,
            "observe_type": self.observe_type,
            // The control plane expects an empty string for "all axes".
            "joint_dir": self.joint_dir.map_or(String::new(), |j| j.to_string()),
            "hz": self.hz,
            "unit": if self.use_rad { "rad" } else { "degree" },
            "timeout": self.timeout_secs,
            "csv": self.csv,
        })
    }

    fn command(&self) -> &'static str {
        match self.mode {
            ObserveMode::Observer => "start_status_report",
            ObserveMode::Compare => "start_status_report_compare",
        }
    }
}

/// One remembered command.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Command name as sent.
    pub cmd: String,
    /// When it was sent.
    pub at: DateTime<Utc>,
}

/// Thin request-builder over [`ArmLink`].
pub struct ArmCommands {
    link: ArmLink,
    history: Mutex<VecDeque<HistoryEntry>>,
}

impl ArmCommands {
    /// Wraps a link.
    pub fn new(link: ArmLink) -> Self {
        Self {
            link,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    async fn call(&self, cmd: &str, data: Value) -> Result<Value> {
        self.record(cmd).await;
        let reply = self.link.send(cmd, data).await?;
        let response = reply.await?;
        response.into_result(cmd)
    }

    async fn record(&self, cmd: &str) {
        let mut history = self.history.lock().await;
        if history.len() >= HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            cmd: cmd.to_string(),
            at: Utc::now(),
        });
    }

    /// Connects the control plane to the arm at `ip`.
    pub async fn connect_arm(&self, ip: &str) -> Result<Value> {
        self.call("xarm_connect", json!({ "ip": ip })).await
    }

    /// Disconnects the arm.
    pub async fn disconnect_arm(&self) -> Result<Value> {
        self.call("xarm_disconnect", json!({})).await
    }

    /// Switches the arm's motion mode.
    pub async fn switch_mode(&self, mode: &str) -> Result<Value> {
        self.call("xarm_switch_mode", json!({ "mode": mode })).await
    }

    /// Enables the servos.
    pub async fn enable_arm(&self) -> Result<Value> {
        self.call("init_xarm", json!({})).await
    }

    /// Emergency stop.
    pub async fn emergency_stop(&self) -> Result<Value> {
        self.call("emergency_stop", json!({})).await
    }

    /// Sends the arm back to its home position.
    pub async fn move_gohome(&self) -> Result<Value> {
        self.call("move_gohome", json!({})).await
    }

    /// Raw console command pass-through (`H106`, `H16`, ...).
    pub async fn console(&self, cmd: &str) -> Result<Value> {
        self.call("send_cmd", json!({ "cmd": cmd })).await
    }

    /// Queries whether a six-axis force/torque sensor is fitted.
    pub async fn ft_sensor_config(&self) -> Result<Value> {
        self.call("xarm_get_ft_sensor_config", json!({})).await
    }

    /// Starts an observation run; telemetry reports follow until stopped.
    pub async fn start_observation(&self, params: &ObserveParams) -> Result<Value> {
        self.call(params.command(), params.payload()).await
    }

    /// Stops the current observation run. `save_path`/`file_name` are empty
    /// unless the control plane should keep its recording.
    pub async fn stop_observation(&self, save_path: &str, file_name: &str) -> Result<Value> {
        self.call(
            "stop_status_report",
            json!({ "save_path": save_path, "file_name": file_name }),
        )
        .await
    }

    /// Copy of the recorded history, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.iter().cloned().collect()
    }
}
