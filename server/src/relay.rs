//! Outbound connection manager for the real-time chat relay
//!
//! In production deployments the engine does not talk to game clients
//! directly: finished-race events are handed to an external relay daemon
//! that owns the per-player realtime connections. This module keeps that
//! single outbound TCP link in an explicit, inspectable object instead of
//! hidden mutable globals: configure via [`RelayConfig`], bring the link up
//! with [`RelayConnector::connect`] (idempotent, retried), push events with
//! `send`, and close it with `teardown`.
//!
//! Frames are length-prefixed bincode [`RelayFrame`] values. The handshake
//! authenticates the engine with its token and verifies the relay's
//! identity token in return.

use crate::notify::Notifier;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{PersonaId, RaceEvent};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

const MAX_FRAME_BYTES: u32 = 64 * 1024;
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// Engine <-> relay wire protocol.
#[derive(Debug, Serialize, Deserialize)]
pub enum RelayFrame {
    Hello { engine_token: String },
    Welcome { relay_identity: String },
    Deliver { persona_id: PersonaId, event: RaceEvent },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Credential presented to the relay during the handshake.
    pub engine_token: String,
    /// Identity token the relay is expected to present back.
    pub relay_identity: String,
    /// Skips verification of the relay's identity token.
    ///
    /// SECURITY: with this set, any process answering on the configured
    /// address can receive every race event and impersonate the relay.
    /// Intended for single-host lab setups only; defaults to off.
    pub accept_unverified_relay: bool,
}

pub struct RelayConnector {
    config: RelayConfig,
    conn: Mutex<Option<TcpStream>>,
}

async fn write_frame(stream: &mut TcpStream, frame: &RelayFrame) -> io::Result<()> {
    let data = bincode::serialize(frame)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_u32(data.len() as u32).await?;
    stream.write_all(&data).await?;
    stream.flush().await
}

async fn read_frame(stream: &mut TcpStream) -> io::Result<RelayFrame> {
    let len = stream.read_u32().await?;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("relay frame of {} bytes exceeds limit", len),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    bincode::deserialize(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl RelayConnector {
    pub fn new(config: RelayConfig) -> Self {
        RelayConnector {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Brings the relay link up. Already-connected calls return
    /// immediately; connection attempts are retried with backoff before
    /// giving up.
    pub async fn connect(&self) -> io::Result<()> {
        let mut conn = self.conn.lock().await;
        if conn.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let mut stream = stream;
                    self.handshake(&mut stream).await?;
                    info!("connected to relay at {}", addr);
                    *conn = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!("relay connect attempt {}/{} failed: {}", attempt, CONNECT_ATTEMPTS, e);
                    last_err = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_BACKOFF * attempt).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "unreachable")))
    }

    async fn handshake(&self, stream: &mut TcpStream) -> io::Result<()> {
        write_frame(
            stream,
            &RelayFrame::Hello {
                engine_token: self.config.engine_token.clone(),
            },
        )
        .await?;

        match read_frame(stream).await? {
            RelayFrame::Welcome { relay_identity } => {
                if relay_identity != self.config.relay_identity {
                    if self.config.accept_unverified_relay {
                        warn!(
                            "relay presented unexpected identity {:?}; accepting because \
                             accept_unverified_relay is set",
                            relay_identity
                        );
                        return Ok(());
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "relay identity verification failed",
                    ));
                }
                Ok(())
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected Welcome during handshake, got {:?}", other),
            )),
        }
    }

    /// Pushes one event frame. A write failure drops the connection so the
    /// next `connect` starts clean.
    pub async fn send(&self, persona_id: PersonaId, event: &RaceEvent) -> io::Result<()> {
        let mut conn = self.conn.lock().await;
        let stream = conn.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "relay link is down")
        })?;

        let frame = RelayFrame::Deliver {
            persona_id,
            event: event.clone(),
        };
        if let Err(e) = write_frame(stream, &frame).await {
            *conn = None;
            return Err(e);
        }
        Ok(())
    }

    /// Closes the relay link. Safe to call when already closed.
    pub async fn teardown(&self) {
        let mut conn = self.conn.lock().await;
        if let Some(mut stream) = conn.take() {
            let _ = stream.shutdown().await;
            info!("relay link closed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }
}

/// [`Notifier`] backend that queues events onto the relay link.
///
/// Queuing keeps the engine's fan-out non-blocking: a writer task drains
/// the queue, and a broken link drops events with a warning while a
/// reconnect is attempted in the background.
pub struct RelayNotifier {
    tx: mpsc::UnboundedSender<(PersonaId, RaceEvent)>,
}

impl RelayNotifier {
    pub fn start(connector: Arc<RelayConnector>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(PersonaId, RaceEvent)>();
        tokio::spawn(async move {
            while let Some((persona_id, event)) = rx.recv().await {
                if let Err(e) = connector.send(persona_id, &event).await {
                    warn!("dropping event for persona {}: {}", persona_id, e);
                    if let Err(e) = connector.connect().await {
                        warn!("relay reconnect failed: {}", e);
                    }
                }
            }
        });
        RelayNotifier { tx }
    }
}

impl Notifier for RelayNotifier {
    fn notify(&self, persona_id: PersonaId, event: RaceEvent) {
        if self.tx.send((persona_id, event)).is_err() {
            warn!("relay writer gone, dropping event for persona {}", persona_id);
        }
    }
}
