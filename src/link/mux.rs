//! Connection multiplexer.
//!
//! [`ArmLink`] owns the single logical connection to the control plane and
//! multiplexes two kinds of traffic over it:
//!
//! - **Commands**: every [`ArmLink::send`] gets a fresh UUID and a resolver
//!   slot; the matching response resolves it exactly once. Late, duplicate
//!   or unknown response ids are logged and dropped.
//! - **Reports**: unsolicited pushes routed by topic to any number of
//!   subscribers, in registration order. Telemetry-shaped reports are
//!   additionally forwarded to the chart actor whether or not anyone
//!   subscribed.
//!
//! An `ArmLink` is an explicitly constructed value, cheap to clone and safe
//! to share; tests build as many independent instances as they need. A
//! transport attaches and detaches over its lifetime; detaching fails every
//! in-flight command with `ConnectionClosed` rather than leaving its caller
//! waiting forever.

use crate::chart::ChartHandle;
use crate::error::{BridgeError, Result};
use crate::link::protocol::{
    InboundMessage, OutboundCommand, ReportFrame, Response, TelemetryFrame, Topic,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// The shared connection abstraction. Clones refer to the same link.
#[derive(Clone)]
pub struct ArmLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    /// One resolver per in-flight command id. The only multi-writer
    /// structure in the link; lock is never held across an await point.
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Response>>>,
    subscribers: Mutex<HashMap<Topic, Vec<Subscriber>>>,
    writer: Mutex<Option<mpsc::UnboundedSender<OutboundCommand>>>,
    chart: Mutex<Option<ChartHandle>>,
    next_subscriber: AtomicU64,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<ReportFrame>,
}

/// Receiving half of one topic subscription.
pub struct Subscription {
    topic: Topic,
    id: u64,
    rx: mpsc::UnboundedReceiver<ReportFrame>,
}

impl Subscription {
    /// Waits for the next report on this topic. `None` once unsubscribed or
    /// the link is dropped.
    pub async fn recv(&mut self) -> Option<ReportFrame> {
        self.rx.recv().await
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

/// A command in flight. Resolves exactly once with the matching response,
/// or with `ConnectionClosed` if the transport drops first. Imposes no
/// timeout of its own.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Response>,
}

impl Future for PendingReply {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|ready| ready.map_err(|_| BridgeError::ConnectionClosed))
    }
}

impl ArmLink {
    /// Creates a link with nothing attached yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LinkInner {
                pending: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                writer: Mutex::new(None),
                chart: Mutex::new(None),
                next_subscriber: AtomicU64::new(0),
            }),
        }
    }

    /// Attaches the outbound half of a transport.
    pub async fn attach(&self, writer: mpsc::UnboundedSender<OutboundCommand>) {
        *self.inner.writer.lock().await = Some(writer);
    }

    /// Attaches the chart actor that receives telemetry-shaped reports.
    pub async fn attach_chart(&self, chart: ChartHandle) {
        *self.inner.chart.lock().await = Some(chart);
    }

    /// Detaches the transport and fails every in-flight command with
    /// `ConnectionClosed`. Called on explicit close and on connection loss.
    pub async fn detach(&self) {
        *self.inner.writer.lock().await = None;
        let dropped: Vec<_> = self.inner.pending.lock().await.drain().collect();
        if !dropped.is_empty() {
            warn!(
                count = dropped.len(),
                "connection closed with commands still in flight"
            );
        }
        // Dropping the resolvers wakes each PendingReply with ConnectionClosed.
    }

    /// Whether a transport is currently attached.
    pub async fn is_connected(&self) -> bool {
        self.inner.writer.lock().await.is_some()
    }

    /// Sends a named command and returns its in-flight reply.
    ///
    /// Fails with `NotConnected` before anything is queued when no transport
    /// is attached. Concurrent sends are independent: each gets its own id
    /// and resolver slot.
    pub async fn send(&self, cmd: &str, data: Value) -> Result<PendingReply> {
        let writer = self
            .inner
            .writer
            .lock()
            .await
            .clone()
            .ok_or(BridgeError::NotConnected)?;

        let command = OutboundCommand::new(cmd, data);
        let id = command.id;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id, tx);

        if writer.send(command).is_err() {
            // Transport died between attach and now; undo the slot.
            self.inner.pending.lock().await.remove(&id);
            return Err(BridgeError::NotConnected);
        }
        Ok(PendingReply { rx })
    }

    /// Classifies and dispatches one inbound message. Never fails: protocol
    /// races are logged and absorbed here.
    pub async fn on_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::Response(response) => {
                let response = response.normalized();
                let resolver = self.inner.pending.lock().await.remove(&response.id);
                match resolver {
                    Some(tx) => {
                        if tx.send(response).is_err() {
                            debug!("caller dropped its reply before the response arrived");
                        }
                    }
                    None => {
                        warn!(id = %response.id, "dropping response with no pending command");
                    }
                }
            }
            InboundMessage::Report(report) => self.on_report(report).await,
        }
    }

    async fn on_report(&self, report: ReportFrame) {
        // Telemetry is forwarded on shape, independent of subscriber count.
        if let Some(frame) = TelemetryFrame::from_value(&report.data) {
            let chart = self.inner.chart.lock().await.clone();
            if let Some(chart) = chart {
                if !chart.try_frame(frame) {
                    warn!(cmd = %report.cmd, "chart saturated, telemetry frame dropped");
                }
            }
        }

        match Topic::of_report(&report) {
            Some(topic) => self.emit(topic, report).await,
            None => warn!(cmd = %report.cmd, "dropping report with unknown topic"),
        }
    }

    async fn emit(&self, topic: Topic, report: ReportFrame) {
        let mut subscribers = self.inner.subscribers.lock().await;
        if let Some(list) = subscribers.get_mut(&topic) {
            // Registration order; drop subscribers whose receiver is gone.
            list.retain(|sub| sub.tx.send(report.clone()).is_ok());
        }
    }

    /// Subscribes to a topic from the closed set of known report names.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let parsed =
            Topic::parse(topic).ok_or_else(|| BridgeError::UnknownTopic(topic.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .await
            .entry(parsed)
            .or_default()
            .push(Subscriber { id, tx });
        Ok(Subscription {
            topic: parsed,
            id,
            rx,
        })
    }

    /// Removes one subscription. The other listeners on the topic are
    /// untouched.
    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.inner.subscribers.lock().await;
        if let Some(list) = subscribers.get_mut(&subscription.topic) {
            list.retain(|sub| sub.id != subscription.id);
        }
    }

    /// Removes every listener on a topic.
    pub async fn clear(&self, topic: &str) -> Result<()> {
        let parsed =
            Topic::parse(topic).ok_or_else(|| BridgeError::UnknownTopic(topic.to_string()))?;
        self.inner.subscribers.lock().await.remove(&parsed);
        Ok(())
    }
}

impl Default for ArmLink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: Uuid, code: i64, data: Value) -> InboundMessage {
        InboundMessage::Response(Response {
            id,
            code,
            data,
            msg: None,
        })
    }

    async fn attached_link() -> (ArmLink, mpsc::UnboundedReceiver<OutboundCommand>) {
        let link = ArmLink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        link.attach(tx).await;
        (link, rx)
    }

    #[tokio::test]
    async fn send_without_transport_fails_synchronously() {
        let link = ArmLink::new();
        match link.send("xarm_connect", json!({})).await {
            Err(BridgeError::NotConnected) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn responses_resolve_their_own_sender_even_out_of_order() {
        let (link, mut wire) = attached_link().await;

        let reply_a = link.send("a", json!({})).await.expect("send a");
        let reply_b = link.send("b", json!({})).await.expect("send b");
        let cmd_a = wire.recv().await.expect("cmd a on wire");
        let cmd_b = wire.recv().await.expect("cmd b on wire");

        let mut task_a = tokio_test::task::spawn(reply_a);
        let mut task_b = tokio_test::task::spawn(reply_b);
        tokio_test::assert_pending!(task_a.poll());
        tokio_test::assert_pending!(task_b.poll());

        // Respond to b first, then a.
        link.on_inbound(response(cmd_b.id, 0, json!("for b"))).await;
        let got_b = tokio_test::assert_ready!(task_b.poll()).expect("b resolves");
        tokio_test::assert_pending!(task_a.poll());

        link.on_inbound(response(cmd_a.id, 0, json!("for a"))).await;
        let got_a = tokio_test::assert_ready!(task_a.poll()).expect("a resolves");
        assert_eq!(got_b.data, json!("for b"));
        assert_eq!(got_a.data, json!("for a"));
    }

    #[tokio::test]
    async fn duplicate_response_is_a_logged_no_op() {
        let (link, mut wire) = attached_link().await;
        let reply = link.send("a", json!({})).await.expect("send");
        let cmd = wire.recv().await.expect("on wire");

        link.on_inbound(response(cmd.id, 0, json!(1))).await;
        // Second and unknown ids must not panic or resolve anything.
        link.on_inbound(response(cmd.id, 0, json!(2))).await;
        link.on_inbound(response(Uuid::new_v4(), 0, json!(3))).await;

        assert_eq!(reply.await.expect("resolved once").data, json!(1));
    }

    #[tokio::test]
    async fn heartbeat_code_is_delivered_as_success() {
        let (link, mut wire) = attached_link().await;
        let reply = link.send("a", json!({})).await.expect("send");
        let cmd = wire.recv().await.expect("on wire");

        link.on_inbound(response(cmd.id, 1001, json!({"seq": 7}))).await;
        let got = reply.await.expect("resolved");
        assert_eq!(got.code, 0);
        assert_eq!(got.data, json!({"seq": 7}));
    }

    #[tokio::test]
    async fn detach_fails_pending_commands_with_connection_closed() {
        let (link, _wire) = attached_link().await;
        let reply = link.send("a", json!({})).await.expect("send");
        link.detach().await;
        match reply.await {
            Err(BridgeError::ConnectionClosed) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected_on_subscribe_and_clear() {
        let link = ArmLink::new();
        match link.subscribe("UNKNOWN_TOPIC").await {
            Err(BridgeError::UnknownTopic(name)) => assert_eq!(name, "UNKNOWN_TOPIC"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert!(link.clear("ALSO_UNKNOWN").await.is_err());
    }

    #[tokio::test]
    async fn all_listeners_receive_reports_in_registration_order() {
        let link = ArmLink::new();
        let mut first = link
            .subscribe("TARGET_ACTUAL_STATUS_REPORT")
            .await
            .expect("subscribe");
        let mut second = link
            .subscribe("TARGET_ACTUAL_STATUS_REPORT")
            .await
            .expect("subscribe");

        link.on_inbound(InboundMessage::Report(ReportFrame {
            cmd: "target_actual_status_report".into(),
            data: json!({"actual_joint_positions": [0.0, 0.1]}),
        }))
        .await;

        assert!(first.recv().await.is_some());
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_only_removes_one_listener() {
        let link = ArmLink::new();
        let first = link.subscribe("OBSERVE_OVER").await.expect("subscribe");
        let mut second = link.subscribe("OBSERVE_OVER").await.expect("subscribe");
        link.unsubscribe(first).await;

        link.on_inbound(InboundMessage::Report(ReportFrame {
            cmd: "observe_over".into(),
            data: json!({}),
        }))
        .await;
        assert!(second.recv().await.is_some());
    }
}
