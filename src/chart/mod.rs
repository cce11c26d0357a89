//! Telemetry aggregation: field model, bounded history, snapshot actor.
pub mod actor;
pub mod field;
pub mod store;
pub mod units;

pub use actor::{ChartActor, ChartCommand, ChartEvent, ChartHandle};
pub use field::{FieldKind, ObserveField};
pub use store::{ChannelKey, RingChannelStore};
