//! Custom error types for the transport core.
//!
//! This module defines the primary error type, `BridgeError`, shared by the
//! link and chart layers. Using the `thiserror` crate, it provides a single
//! place where every failure a collaborator can observe is enumerated.
//!
//! Protocol races that the multiplexer recovers from locally (unmatched or
//! duplicate responses, ring-buffer eviction, out-of-range axis samples) are
//! deliberately *not* represented here: they are logged and absorbed, never
//! surfaced to callers.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced to calling collaborators.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A command was sent while no transport is attached to the link.
    /// Surfaced synchronously; the command is never queued.
    #[error("not connected to the control plane")]
    NotConnected,

    /// Subscribe/unsubscribe/clear was called with a topic outside the
    /// closed set of known report topics.
    #[error("unknown report topic: {0}")]
    UnknownTopic(String),

    /// The connection dropped while a command was still in flight.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// A chart control message could not be delivered because the chart
    /// actor has stopped.
    #[error("chart worker has stopped")]
    ChartStopped,

    /// The control plane answered a command with a non-zero code.
    #[error("command '{cmd}' failed with code {code}: {msg}")]
    Command {
        /// Command name as sent on the wire.
        cmd: String,
        /// Response code reported by the control plane.
        code: i64,
        /// Human-readable message, empty if the control plane sent none.
        msg: String,
    },

    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_carries_wire_context() {
        let err = BridgeError::Command {
            cmd: "xarm_connect".into(),
            code: 2,
            msg: "arm is offline".into(),
        };
        let text = err.to_string();
        assert!(text.contains("xarm_connect"));
        assert!(text.contains("code 2"));
        assert!(text.contains("arm is offline"));
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))?;
            Ok(())
        }
        match fails() {
            Err(BridgeError::Io(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
