//! Control-plane connection: wire model, multiplexer, transport, commands.
pub mod commands;
pub mod mux;
pub mod protocol;
pub mod transport;

pub use commands::{ArmCommands, ObserveMode, ObserveParams, SampleRate};
pub use mux::{ArmLink, PendingReply, Subscription};
pub use protocol::{InboundMessage, OutboundCommand, ReportFrame, Response, TelemetryFrame, Topic};
pub use transport::{connect, LinkConnection};
