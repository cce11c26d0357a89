//! # Arm Bridge Core Library
//!
//! This crate is the real-time command/telemetry transport core of a desktop
//! control panel for a robotic arm. The panel's pages, dialogs and charts
//! are external collaborators; what lives here is the part that has to keep
//! up with the wire: one multiplexed connection to the local control-plane
//! process, and a streaming aggregation engine that turns a telemetry
//! firehose into bounded, render-ready snapshots.
//!
//! ## Crate Structure
//!
//! - **`link`**: the connection side. `protocol` defines the wire shapes and
//!   the closed topic set; `mux::ArmLink` correlates responses to commands
//!   and fans reports out to subscribers; `transport` services the TCP
//!   socket; `commands::ArmCommands` is the typed façade UI code calls.
//! - **`chart`**: the telemetry side. `field` models the closed field/unit
//!   tables; `store` keeps bounded per-channel ring buffers; `actor` is the
//!   aggregation actor that ingests frames and emits snapshots on a fixed
//!   cadence, decoupled from arrival rate.
//! - **`config`**: layered settings (defaults, optional TOML, environment).
//! - **`error`**: the `BridgeError` enum shared by both layers.
//! - **`logging`**: `tracing` subscriber setup.
//!
//! Ingestion/aggregation and rendering never share mutable state; they
//! exchange `ChartCommand`/`ChartEvent` messages over channels, so a burst
//! of 250 Hz telemetry can never stall the interactive side.

pub mod chart;
pub mod config;
pub mod error;
pub mod link;
pub mod logging;
