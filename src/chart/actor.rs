//! Telemetry aggregation actor.
//!
//! This module defines the command and event types used for message-passing
//! between the UI collaborator and the [`ChartActor`], plus the actor itself.
//!
//! # Architecture
//!
//! Ingestion and aggregation run on the actor task; rendering runs elsewhere.
//! The two sides communicate exclusively through channels:
//!
//! ```text
//! UI / render side                   Chart actor task
//! ----------------                   ----------------
//! ChartHandle::set_* / clear  ---->  handle ChartCommand (mutate state)
//! link telemetry forwarding   ---->  ingest TelemetryFrame into rings
//!                                    fixed-interval snapshot timer
//! events receiver             <----  ChartEvent::Joints { value, label }
//! ```
//!
//! Snapshots are emitted with `try_send` on a small bounded channel: a slow
//! consumer lowers the effective snapshot rate instead of queuing without
//! bound, and ingestion is never blocked by emission.

use crate::chart::field::{clamp_joint_count, FieldKind, ObserveField};
use crate::chart::store::{ChannelKey, RingChannelStore};
use crate::chart::units::{rad_to_deg, round3};
use crate::config::ChartSettings;
use crate::error::{BridgeError, Result};
use crate::link::protocol::TelemetryFrame;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Telemetry frames queued ahead of the actor before it starts shedding.
const COMMAND_QUEUE: usize = 256;
/// Snapshots queued ahead of the consumer before emissions are skipped.
const EVENT_QUEUE: usize = 4;

/// Control and data messages accepted by the chart actor.
#[derive(Debug)]
pub enum ChartCommand {
    /// A decoded telemetry frame to fan out into the ring buffers.
    Frame(TelemetryFrame),
    /// Sets the joint count of the connected arm (clamped to 3..=8).
    SetJointModel(usize),
    /// Restricts accumulation to one axis, or lifts the restriction.
    ///
    /// Unselected axes keep the history they already accumulated; switching
    /// the filter back must not lose data.
    SetCurrentJoint(Option<usize>),
    /// `true` stores angular values in radians, `false` converts to degrees
    /// at write time. Callers clear the chart alongside, history is never
    /// re-converted.
    SetRadUnit(bool),
    /// Changes the per-channel history capacity.
    SetMaxDot(usize),
    /// Switches the observed field or analysis pair. Callers follow up with
    /// [`ChartCommand::ClearJoints`], as the panel does.
    SetObserveField(ObserveField),
    /// Flushes all channels and re-creates empty buffers for the current
    /// selection, then emits one snapshot so consumers see the reset.
    ClearJoints,
    /// Forces one immediate snapshot emission.
    PostChartData,
    /// Starts (`true`) or stops (`false`) the periodic snapshot loop.
    SetStreaming(bool),
}

/// One axis worth of snapshot data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AxisChannels {
    /// Axis index.
    pub axis: usize,
    /// Selected field series, keyed by wire field name.
    pub channels: BTreeMap<FieldKind, Vec<f64>>,
}

/// Messages emitted by the chart actor.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum ChartEvent {
    /// A snapshot of the selected channels for every tracked axis.
    Joints {
        /// Per-axis series copies.
        value: Vec<AxisChannels>,
        /// Synthetic 1-based x-axis labels, not wall-clock time.
        label: Vec<String>,
    },
}

/// Cloneable, typed sender half for the chart actor.
#[derive(Debug, Clone)]
pub struct ChartHandle {
    tx: mpsc::Sender<ChartCommand>,
}

impl ChartHandle {
    /// Sends one control message, waiting for queue space.
    pub async fn send(&self, cmd: ChartCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| BridgeError::ChartStopped)
    }

    /// Forwards a telemetry frame without blocking. Returns `false` when the
    /// frame was shed because the actor is saturated or gone.
    pub fn try_frame(&self, frame: TelemetryFrame) -> bool {
        self.tx.try_send(ChartCommand::Frame(frame)).is_ok()
    }

    /// Sets the joint count of the connected arm.
    pub async fn set_joint_model(&self, joints: usize) -> Result<()> {
        self.send(ChartCommand::SetJointModel(joints)).await
    }

    /// Selects a single axis to accumulate, or `None` for all axes.
    pub async fn set_current_joint(&self, axis: Option<usize>) -> Result<()> {
        self.send(ChartCommand::SetCurrentJoint(axis)).await
    }

    /// Chooses radians (`true`) or degrees (`false`) for angular fields.
    pub async fn set_rad_unit(&self, use_rad: bool) -> Result<()> {
        self.send(ChartCommand::SetRadUnit(use_rad)).await
    }

    /// Changes the per-channel history capacity.
    pub async fn set_max_dot(&self, capacity: usize) -> Result<()> {
        self.send(ChartCommand::SetMaxDot(capacity)).await
    }

    /// Switches the observed field or analysis pair.
    pub async fn set_observe_field(&self, field: ObserveField) -> Result<()> {
        self.send(ChartCommand::SetObserveField(field)).await
    }

    /// Flushes history and re-creates empty buffers for the selection.
    pub async fn clear_joints(&self) -> Result<()> {
        self.send(ChartCommand::ClearJoints).await
    }

    /// Forces one immediate snapshot.
    pub async fn post_chart_data(&self) -> Result<()> {
        self.send(ChartCommand::PostChartData).await
    }

    /// Starts or stops the periodic snapshot loop.
    pub async fn set_streaming(&self, on: bool) -> Result<()> {
        self.send(ChartCommand::SetStreaming(on)).await
    }
}

/// The aggregation actor: rings in, snapshots out.
pub struct ChartActor {
    commands: mpsc::Receiver<ChartCommand>,
    events: mpsc::Sender<ChartEvent>,
    store: RingChannelStore,
    joint_model: usize,
    current_joint: Option<usize>,
    use_rad: bool,
    observe: ObserveField,
    streaming: bool,
    emit_interval: Duration,
}

impl ChartActor {
    /// Spawns the actor onto the runtime.
    ///
    /// Returns the typed handle, the snapshot receiver for the rendering
    /// collaborator, and the actor task handle.
    pub fn spawn(
        settings: &ChartSettings,
    ) -> (ChartHandle, mpsc::Receiver<ChartEvent>, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (events, events_rx) = mpsc::channel(EVENT_QUEUE);
        let actor = ChartActor {
            commands,
            events,
            store: RingChannelStore::new(settings.max_dot),
            joint_model: clamp_joint_count(settings.joint_model),
            current_joint: None,
            use_rad: false,
            observe: ObserveField::default(),
            streaming: false,
            emit_interval: Duration::from_millis(settings.emit_interval_ms),
        };
        let task = tokio::spawn(actor.run());
        (ChartHandle { tx }, events_rx, task)
    }

    async fn run(mut self) {
        self.rebuild_channels();

        let mut ticker = interval(self.emit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = self.commands.recv() => {
                    match maybe {
                        Some(cmd) => self.handle(cmd),
                        None => {
                            debug!("all chart handles dropped, stopping actor");
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if self.streaming => {
                    self.emit();
                }
            }
        }
    }

    fn handle(&mut self, cmd: ChartCommand) {
        match cmd {
            ChartCommand::Frame(frame) => self.ingest(frame),
            ChartCommand::SetJointModel(joints) => {
                self.joint_model = clamp_joint_count(joints);
            }
            ChartCommand::SetCurrentJoint(axis) => {
                self.current_joint = axis.filter(|a| *a < self.joint_model);
            }
            ChartCommand::SetRadUnit(use_rad) => {
                self.use_rad = use_rad;
            }
            ChartCommand::SetMaxDot(capacity) => {
                self.store.set_capacity(capacity.max(1));
            }
            ChartCommand::SetObserveField(field) => {
                self.observe = field;
            }
            ChartCommand::ClearJoints => {
                self.store.clear_all();
                self.rebuild_channels();
                self.emit();
            }
            ChartCommand::PostChartData => self.emit(),
            ChartCommand::SetStreaming(on) => {
                self.streaming = on;
                if on {
                    self.emit();
                }
            }
        }
    }

    /// Fans one frame out into the ring buffers.
    ///
    /// The first element of every field is a timestamp marker and is
    /// stripped. Samples beyond the configured joint count are dropped.
    fn ingest(&mut self, frame: TelemetryFrame) {
        for (field, samples) in frame.fields {
            let mut samples = samples.into_iter();
            let _timestamp = samples.next();

            for (axis, raw) in samples.enumerate().take(self.joint_model) {
                if self.current_joint.is_some_and(|selected| selected != axis) {
                    continue;
                }
                let value = match field.unit(axis) {
                    Some(unit) if unit.is_angular() && !self.use_rad => rad_to_deg(raw),
                    _ => raw,
                };
                self.store.append(ChannelKey::new(axis, field), round3(value));
            }
        }
    }

    /// Pre-creates empty channels for the current selection so a cleared
    /// chart still reports every configured channel.
    fn rebuild_channels(&mut self) {
        for axis in 0..self.joint_model {
            for field in self.observe.source_fields() {
                self.store.register(ChannelKey::new(axis, field));
            }
        }
    }

    fn emit(&mut self) {
        let event = self.snapshot();
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                trace!("snapshot consumer is behind, skipping emission");
            }
            Err(TrySendError::Closed(_)) => {
                if self.streaming {
                    debug!("snapshot consumer is gone, stopping the stream");
                    self.streaming = false;
                }
            }
        }
    }

    /// Immutable copy of the selected channels for every tracked axis.
    fn snapshot(&self) -> ChartEvent {
        let sources = self.observe.source_fields();
        let mut value = Vec::with_capacity(self.joint_model);
        let mut longest = 0;

        for axis in 0..self.joint_model {
            let mut channels = BTreeMap::new();
            for field in &sources {
                let series = self.store.snapshot(ChannelKey::new(axis, *field));
                longest = longest.max(series.len());
                channels.insert(*field, series);
            }
            if let ObserveField::Analysis(kind) = self.observe {
                let (target, actual) = kind.pair();
                let diff = difference_series(&channels[&target], &channels[&actual]);
                channels.insert(FieldKind::Difference, diff);
            }
            value.push(AxisChannels { axis, channels });
        }

        let label = (1..=longest.max(1)).map(|i| i.to_string()).collect();
        ChartEvent::Joints { value, label }
    }
}

/// Target-minus-actual series, derived at snapshot time.
///
/// Series are aligned at the tail: rings evict oldest-first, so the newest
/// samples of both channels line up even when one started earlier.
pub fn difference_series(target: &[f64], actual: &[f64]) -> Vec<f64> {
    let n = target.len().min(actual.len());
    let target = &target[target.len() - n..];
    let actual = &actual[actual.len() - n..];
    target
        .iter()
        .zip(actual)
        .map(|(t, a)| round3(t - a))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::field::AnalysisKind;

    fn test_actor(observe: ObserveField) -> (ChartActor, mpsc::Receiver<ChartEvent>) {
        let (_tx, commands) = mpsc::channel(8);
        let (events, events_rx) = mpsc::channel(8);
        let mut actor = ChartActor {
            commands,
            events,
            store: RingChannelStore::new(100),
            joint_model: 6,
            current_joint: None,
            use_rad: false,
            observe,
            streaming: false,
            emit_interval: Duration::from_millis(200),
        };
        actor.rebuild_channels();
        (actor, events_rx)
    }

    fn frame(field: FieldKind, samples: &[f64]) -> TelemetryFrame {
        TelemetryFrame {
            fields: vec![(field, samples.to_vec())],
        }
    }

    #[tokio::test]
    async fn ingest_strips_timestamp_and_converts_to_degrees() {
        let (mut actor, _rx) = test_actor(ObserveField::Single(FieldKind::ActualJointPositions));
        // First element is the timestamp marker.
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[1712640001.0, std::f64::consts::FRAC_PI_2, 0.0, 0.0, 0.0, 0.0, 0.0],
        ));
        let series = actor
            .store
            .snapshot(ChannelKey::new(0, FieldKind::ActualJointPositions));
        assert_eq!(series, vec![90.0]);
    }

    #[tokio::test]
    async fn radian_mode_stores_raw_values() {
        let (mut actor, _rx) = test_actor(ObserveField::Single(FieldKind::ActualJointPositions));
        actor.use_rad = true;
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[0.0, 1.5708, 0.25, 0.0, 0.0, 0.0, 0.0],
        ));
        let series = actor
            .store
            .snapshot(ChannelKey::new(0, FieldKind::ActualJointPositions));
        assert_eq!(series, vec![1.571]);
    }

    #[tokio::test]
    async fn samples_beyond_joint_model_are_dropped() {
        let (mut actor, _rx) = test_actor(ObserveField::Single(FieldKind::ActualJointPositions));
        actor.joint_model = 3;
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
        ));
        for axis in 0..3 {
            assert_eq!(
                actor
                    .store
                    .len(ChannelKey::new(axis, FieldKind::ActualJointPositions)),
                1
            );
        }
        assert_eq!(
            actor
                .store
                .len(ChannelKey::new(3, FieldKind::ActualJointPositions)),
            0
        );
    }

    #[tokio::test]
    async fn current_joint_filter_preserves_other_axes() {
        let (mut actor, _rx) = test_actor(ObserveField::Single(FieldKind::ActualJointPositions));
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ));
        actor.handle(ChartCommand::SetCurrentJoint(Some(1)));
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
        ));

        let key0 = ChannelKey::new(0, FieldKind::ActualJointPositions);
        let key1 = ChannelKey::new(1, FieldKind::ActualJointPositions);
        // Axis 1 accumulated both frames; axis 0 kept its earlier history.
        assert_eq!(actor.store.len(key1), 2);
        assert_eq!(actor.store.len(key0), 1);
    }

    #[tokio::test]
    async fn snapshot_derives_difference_in_analysis_mode() {
        let (mut actor, _rx) = test_actor(ObserveField::Analysis(AnalysisKind::JointPositions));
        actor.use_rad = true;
        actor.ingest(TelemetryFrame {
            fields: vec![
                (FieldKind::TargetJointPositions, vec![0.0, 0.5, 0.5]),
                (FieldKind::ActualJointPositions, vec![0.0, 0.2, 0.4]),
            ],
        });
        let ChartEvent::Joints { value, .. } = actor.snapshot();
        let axis0 = &value[0];
        assert_eq!(axis0.channels[&FieldKind::TargetJointPositions], vec![0.5]);
        assert_eq!(axis0.channels[&FieldKind::ActualJointPositions], vec![0.2]);
        assert_eq!(axis0.channels[&FieldKind::Difference], vec![0.3]);
    }

    #[tokio::test]
    async fn clear_emits_empty_configured_channels() {
        let (mut actor, mut rx) = test_actor(ObserveField::Single(FieldKind::ActualJointPositions));
        actor.ingest(frame(
            FieldKind::ActualJointPositions,
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ));
        actor.handle(ChartCommand::ClearJoints);

        let ChartEvent::Joints { value, label } = rx.try_recv().expect("snapshot after clear");
        assert_eq!(value.len(), 6);
        for axis in &value {
            for series in axis.channels.values() {
                assert!(series.is_empty());
            }
        }
        assert_eq!(label, vec!["1".to_string()]);
    }

    #[test]
    fn difference_aligns_series_at_the_tail() {
        // Target started earlier; only the overlapping tail is compared.
        let target = [9.0, 9.0, 1.0, 2.0, 3.0];
        let actual = [0.5, 1.5, 2.5];
        assert_eq!(difference_series(&target, &actual), vec![0.5, 0.5, 0.5]);
        assert_eq!(difference_series(&[], &actual), Vec::<f64>::new());
    }
}
