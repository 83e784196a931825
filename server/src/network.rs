//! UDP request front end and main loop coordination
//!
//! The engine itself is transport-agnostic; this module is the thin surface
//! that decodes [`Packet`] requests, drives the [`Arbiter`], and replies.
//! It also owns connection policy: a replayed submission gets a
//! [`Packet::Kicked`] reply and loses its peer association instead of a
//! normal error payload.

use crate::arbiter::Arbiter;
use crate::dnf::DnfElapsed;
use crate::error::EngineError;
use crate::store::{Session, SessionStore};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PersonaId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Messages sent from network tasks to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Outgoing packets queued for the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Reply for a failed request: replays terminate the connection, all other
/// failures produce a normal error payload.
fn failure_reply(err: &EngineError) -> Packet {
    if err.should_disconnect() {
        Packet::Kicked {
            reason: err.to_string(),
        }
    } else {
        Packet::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// UDP server coordinating request handling and DNF timer completion
pub struct Server {
    socket: Arc<UdpSocket>,
    store: Arc<dyn SessionStore>,
    arbiter: Arc<Arbiter>,
    // Launched peers; dropped again when a caller gets kicked.
    peers: HashMap<SocketAddr, PersonaId>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    dnf_rx: mpsc::UnboundedReceiver<DnfElapsed>,
}

impl Server {
    pub async fn new(
        addr: &str,
        store: Arc<dyn SessionStore>,
        arbiter: Arc<Arbiter>,
        dnf_rx: mpsc::UnboundedReceiver<DnfElapsed>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("arbitration server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            store,
            arbiter,
            peers: HashMap::new(),
            server_tx,
            server_rx,
            out_tx,
            out_rx,
            dnf_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that continuously listens for incoming requests
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("failed to decode request from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("error receiving request: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing reply queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(OutboundMessage::SendPacket { packet, addr }) = out_rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("failed to send reply to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("failed to encode reply for {}: {}", addr, e),
                }
            }
        });
    }

    fn queue_reply(&self, packet: Packet, addr: SocketAddr) {
        if self
            .out_tx
            .send(OutboundMessage::SendPacket { packet, addr })
            .is_err()
        {
            error!("sender task gone, dropping reply for {}", addr);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::OpenSession {
                session_id,
                event_id,
                mode,
                dnf_enabled,
            } => {
                let session = Session::new(session_id, event_id, mode, dnf_enabled);
                let reply = match self.store.create_session(session).await {
                    Ok(()) => Packet::Ack,
                    Err(e) => failure_reply(&e),
                };
                self.queue_reply(reply, addr);
            }

            Packet::Launch {
                session_id,
                persona_id,
            } => {
                let reply = match self.arbiter.launch(session_id, persona_id).await {
                    Ok(()) => {
                        self.peers.insert(addr, persona_id);
                        Packet::Ack
                    }
                    Err(e) => failure_reply(&e),
                };
                self.queue_reply(reply, addr);
            }

            Packet::Submit {
                session_id,
                persona_id,
                telemetry,
            } => {
                let result = self.arbiter.submit(session_id, persona_id, &telemetry).await;
                self.reply_with_outcome(result, addr);
            }

            Packet::Bust {
                session_id,
                persona_id,
                telemetry,
            } => {
                let result = self.arbiter.bust(session_id, persona_id, &telemetry).await;
                self.reply_with_outcome(result, addr);
            }

            Packet::Abort { session_id } => {
                let reply = match self.arbiter.abort(session_id).await {
                    Ok(()) => Packet::Ack,
                    Err(e) => failure_reply(&e),
                };
                self.queue_reply(reply, addr);
            }

            _ => {
                warn!("unexpected packet type from {}", addr);
            }
        }
    }

    fn reply_with_outcome(
        &mut self,
        result: Result<shared::Outcome, EngineError>,
        addr: SocketAddr,
    ) {
        match result {
            Ok(outcome) => self.queue_reply(Packet::RaceOutcome { outcome }, addr),
            Err(e) => {
                if e.should_disconnect() {
                    if let Some(persona_id) = self.peers.remove(&addr) {
                        info!("dropping peer {} (persona {}): {}", addr, persona_id, e);
                    }
                }
                self.queue_reply(failure_reply(&e), addr);
            }
        }
    }

    /// Main loop: requests from the socket and elapsed DNF countdowns.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        info!("arbitration server started");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("arbitration server shutting down");
                            break;
                        }
                    }
                },

                elapsed = self.dnf_rx.recv() => {
                    if let Some(DnfElapsed { session_id, persona_id, token }) = elapsed {
                        match self.arbiter.finalize_dnf(session_id, persona_id, token).await {
                            Ok(Some(outcome)) => debug!(
                                "DNF outcome synthesized for persona {} in session {} ({} entrants)",
                                persona_id, session_id, outcome.entrants.len()
                            ),
                            Ok(None) => {}
                            Err(e) => error!(
                                "failed to finalize DNF for persona {} in session {}: {}",
                                persona_id, session_id, e
                            ),
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorKind;

    #[test]
    fn replayed_submission_reply_is_a_kick() {
        let err = EngineError::AlreadyCompleted {
            session_id: 1,
            persona_id: 2,
        };
        match failure_reply(&err) {
            Packet::Kicked { reason } => assert!(reason.contains("final result")),
            other => panic!("expected Kicked, got {:?}", other),
        }
    }

    #[test]
    fn ordinary_failures_reply_with_error_payloads() {
        match failure_reply(&EngineError::SessionNotFound(9)) {
            Packet::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
            other => panic!("expected Error, got {:?}", other),
        }
        match failure_reply(&EngineError::MalformedRequest("bad".into())) {
            Packet::Error { kind, .. } => assert_eq!(kind, ErrorKind::MalformedRequest),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn server_message_carries_packet_and_source() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let msg = ServerMessage::PacketReceived {
            packet: Packet::Abort { session_id: 3 },
            addr,
        };
        match msg {
            ServerMessage::PacketReceived {
                packet: Packet::Abort { session_id },
                addr: a,
            } => {
                assert_eq!(session_id, 3);
                assert_eq!(a, addr);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
