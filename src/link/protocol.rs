//! Wire model for the control-plane connection.
//!
//! Messages travel as JSON, one object per line. Outbound commands carry a
//! fresh UUID the control plane echoes back in its response; unsolicited
//! reports carry no id and are routed by topic instead.

use crate::chart::field::FieldKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Reserved response code marking a heartbeat/keepalive. Normalized to
/// success before delivery since it carries no business meaning.
pub const HEARTBEAT_CODE: i64 = 1001;

/// A command as written to the socket: `{id, cmd, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundCommand {
    /// Correlation id echoed by the response.
    pub id: Uuid,
    /// Command name, e.g. `xarm_connect`.
    pub cmd: String,
    /// Command payload; `{}` when the command takes none.
    pub data: Value,
}

impl OutboundCommand {
    /// Builds a command with a fresh correlation id.
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            cmd: cmd.into(),
            data,
        }
    }
}

/// A response correlated to exactly one outstanding command by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id of the command this answers.
    pub id: Uuid,
    /// Status code; 0 is success.
    pub code: i64,
    /// Response payload.
    #[serde(default)]
    pub data: Value,
    /// Optional human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl Response {
    /// Maps the reserved heartbeat code to success, leaving data and message
    /// untouched. Idempotent.
    pub fn normalized(mut self) -> Self {
        if self.code == HEARTBEAT_CODE {
            self.code = 0;
        }
        self
    }

    /// Turns a non-zero code into [`crate::error::BridgeError::Command`].
    pub fn into_result(self, cmd: &str) -> crate::error::Result<Value> {
        if self.code == 0 {
            Ok(self.data)
        } else {
            Err(crate::error::BridgeError::Command {
                cmd: cmd.to_string(),
                code: self.code,
                msg: self.msg.unwrap_or_default(),
            })
        }
    }
}

/// An unsolicited report pushed by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFrame {
    /// Report name; upper-cased it becomes the subscription topic.
    pub cmd: String,
    /// Report payload.
    #[serde(default)]
    pub data: Value,
}

/// Any message read from the socket, classified by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Correlated answer to an outstanding command.
    Response(Response),
    /// Unsolicited push, routed by topic.
    Report(ReportFrame),
}

/// The closed set of report topics known to this build.
///
/// Topics are derived by upper-casing the report's `cmd` field; anything
/// not in this set is rejected at the subscribe API and dropped (with a
/// log line) on the wire path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// High-frequency target/actual telemetry stream.
    TargetActualStatusReport,
    /// Arm firmware/serial/version information.
    DevicesInfoReport,
    /// Observation run finished on the control-plane side.
    ObserveOver,
    /// Connection/mode/state changes of the arm itself.
    XarmStateReport,
}

/// Every known topic, in a stable order.
pub const ALL_TOPICS: [Topic; 4] = [
    Topic::TargetActualStatusReport,
    Topic::DevicesInfoReport,
    Topic::ObserveOver,
    Topic::XarmStateReport,
];

impl Topic {
    /// Canonical (upper-case) topic name.
    pub fn name(self) -> &'static str {
        match self {
            Topic::TargetActualStatusReport => "TARGET_ACTUAL_STATUS_REPORT",
            Topic::DevicesInfoReport => "DEVICES_INFO_REPORT",
            Topic::ObserveOver => "OBSERVE_OVER",
            Topic::XarmStateReport => "XARM_STATE_REPORT",
        }
    }

    /// Parses a canonical topic name.
    pub fn parse(name: &str) -> Option<Self> {
        ALL_TOPICS.iter().copied().find(|t| t.name() == name)
    }

    /// Derives the topic of a report from its wire `cmd`.
    pub fn of_report(report: &ReportFrame) -> Option<Self> {
        Self::parse(&report.cmd.to_uppercase())
    }
}

/// A decoded multi-axis telemetry frame: per-field sample lists, leading
/// timestamp marker still attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    /// Known fields present in the frame, in wire order.
    pub fields: Vec<(FieldKind, Vec<f64>)>,
}

impl TelemetryFrame {
    /// Structural match on a report payload: an object whose keys parse as
    /// field names and whose values are arrays of numbers (the wire often
    /// sends them as numeric strings; both are accepted). Unknown keys and
    /// the derived difference field are skipped. `None` unless at least one
    /// field matches.
    pub fn from_value(data: &Value) -> Option<Self> {
        let map = data.as_object()?;
        let mut fields = Vec::new();
        for (name, samples) in map {
            let Some(field) = FieldKind::parse(name) else {
                continue;
            };
            if field.is_derived() {
                continue;
            }
            let Some(list) = samples.as_array() else {
                continue;
            };
            let parsed: Vec<f64> = list.iter().filter_map(as_sample).collect();
            if parsed.len() == list.len() {
                fields.push((field, parsed));
            }
        }
        if fields.is_empty() {
            None
        } else {
            Some(TelemetryFrame { fields })
        }
    }
}

fn as_sample(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
