//! TCP transport for the control-plane connection.
//!
//! Messages are JSON objects, one per line. Two tasks service the socket:
//! a writer draining the link's outbound queue, and a reader decoding lines
//! into [`InboundMessage`]s for [`ArmLink::on_inbound`]. A line that fails
//! to decode is logged and skipped; only socket-level errors end the
//! connection. When the reader stops, the link is detached, which fails any
//! commands still in flight.
//!
//! Reconnection policy lives with the calling collaborator, not here.

use crate::error::Result;
use crate::link::mux::ArmLink;
use crate::link::protocol::{InboundMessage, OutboundCommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle to an open connection; closing it detaches the link.
pub struct LinkConnection {
    link: ArmLink,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Connects to the control plane and wires the socket to `link`.
pub async fn connect(link: &ArmLink, addr: &str) -> Result<LinkConnection> {
    let stream = TcpStream::connect(addr).await?;
    info!(%addr, "connected to control plane");
    let (read_half, mut write_half) = stream.into_split();

    let (tx, mut outbound) = mpsc::unbounded_channel::<OutboundCommand>();
    link.attach(tx).await;

    let writer = tokio::spawn(async move {
        while let Some(command) = outbound.recv().await {
            let mut line = match serde_json::to_vec(&command) {
                Ok(line) => line,
                Err(e) => {
                    error!(cmd = %command.cmd, error = %e, "dropping unserializable command");
                    continue;
                }
            };
            line.push(b'\n');
            if let Err(e) = write_half.write_all(&line).await {
                error!(error = %e, "write failed, stopping outbound task");
                break;
            }
        }
        debug!("outbound task finished");
    });

    let reader = tokio::spawn({
        let link = link.clone();
        async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<InboundMessage>(&line) {
                            Ok(message) => link.on_inbound(message).await,
                            Err(e) => warn!(error = %e, "skipping undecodable message"),
                        }
                    }
                    Ok(None) => {
                        info!("control plane closed the connection");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "read failed, closing connection");
                        break;
                    }
                }
            }
            link.detach().await;
        }
    });

    Ok(LinkConnection {
        link: link.clone(),
        reader,
        writer,
    })
}

impl LinkConnection {
    /// Detaches the link (failing in-flight commands) and stops both socket
    /// tasks.
    pub async fn close(self) {
        self.link.detach().await;
        // Detaching dropped the outbound sender, so the writer drains and
        // exits; the reader is parked on the socket and needs the abort.
        self.reader.abort();
        let _ = self.writer.await;
    }

    /// Completes when the connection has ended for any reason.
    pub async fn finished(&mut self) {
        let _ = (&mut self.reader).await;
    }
}
