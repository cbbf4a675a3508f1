//! Connection manager: accept loop, per-client workers, and plan delivery.
//!
//! Each accepted socket is owned by exactly one worker thread, which reads
//! and re-frames bytes, runs the router, and executes the returned delivery
//! plan. Writes go through a per-connection mutex-guarded clone of the
//! stream, and every frame is written with a single `write_all`, so frames
//! from concurrent broadcasters are never interleaved on the wire.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::net::messages::{Message, MAX_FRAME_LEN};

use super::players::ConnectionId;
use super::router::{self, DeliveryMode, Outbound};
use super::SharedState;

/// Poll period for the non-blocking accept loop while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Read chunk size for the per-client line buffer.
const READ_CHUNK: usize = 4096;

/// Why a worker is tearing its connection down; decides the status value in
/// the PLAYER_DISCONNECTED room notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TeardownReason {
    PeerClosed,
    ProtocolViolation,
}

impl TeardownReason {
    fn status(self) -> &'static str {
        match self {
            Self::PeerClosed => "temporarily_disconnected",
            Self::ProtocolViolation => "invalid_message",
        }
    }
}

/// Write half of one accepted connection.
pub(crate) struct PeerConnection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: Mutex<TcpStream>,
}

impl PeerConnection {
    /// Serializes and sends one message as a single write. Non-signalling:
    /// failures are returned, never raised.
    fn send(&self, message: &Message) -> std::io::Result<()> {
        let mut frame = message.serialize();
        frame.push('\n');
        let mut stream = self.stream.lock().unwrap();
        stream.write_all(frame.as_bytes())
    }

    fn shutdown(&self) {
        if let Ok(stream) = self.stream.lock() {
            let _ignored = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Live connections by id. The worker registers its connection on accept and
/// removes it during teardown; broadcasts and targeted sends look peers up
/// here.
pub(crate) struct ConnectionTable {
    inner: Mutex<ConnectionsInner>,
}

#[derive(Default)]
struct ConnectionsInner {
    peers: HashMap<ConnectionId, Arc<PeerConnection>>,
    next_id: ConnectionId,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(ConnectionsInner::default()),
        }
    }

    fn register(&self, write_half: TcpStream, addr: SocketAddr) -> Arc<PeerConnection> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let peer = Arc::new(PeerConnection {
            id: inner.next_id,
            addr,
            stream: Mutex::new(write_half),
        });
        inner.peers.insert(peer.id, Arc::clone(&peer));
        peer
    }

    fn remove(&self, id: ConnectionId) {
        self.inner.lock().unwrap().peers.remove(&id);
    }

    pub(crate) fn get(&self, id: ConnectionId) -> Option<Arc<PeerConnection>> {
        self.inner.lock().unwrap().peers.get(&id).cloned()
    }

    /// Shuts down every live socket so blocked readers wake during shutdown.
    pub(crate) fn shutdown_all(&self) {
        let peers: Vec<Arc<PeerConnection>> =
            self.inner.lock().unwrap().peers.values().cloned().collect();
        for peer in peers {
            peer.shutdown();
        }
    }
}

/// Accept loop. The listener polls non-blocking so it can observe the
/// shutdown flag between attempts.
pub(crate) fn accept_loop(listener: &TcpListener, state: &Arc<SharedState>) {
    if let Err(error) = listener.set_nonblocking(true) {
        tracing::error!(%error, "failed to set listener non-blocking");
        return;
    }

    while state.is_running() {
        match listener.accept() {
            Ok((stream, addr)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let state = Arc::clone(state);
                let spawned = thread::Builder::new()
                    .name("client".to_string())
                    .spawn(move || handle_client(stream, addr, &state));
                if let Err(error) = spawned {
                    tracing::error!(%error, "failed to spawn client worker");
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(error) => {
                if state.is_running() {
                    tracing::error!(%error, "accept failed");
                }
                break;
            }
        }
    }
}

/// Per-client worker: owns the socket for reads, re-frames LF-terminated
/// lines, routes each frame, and delivers the plan.
fn handle_client(mut stream: TcpStream, addr: SocketAddr, state: &Arc<SharedState>) {
    // The worker keeps the original stream for reads; a cloned write half
    // lives in the connection table behind its write mutex.
    let write_half = match stream.try_clone() {
        Ok(write_half) => write_half,
        Err(error) => {
            tracing::warn!(%error, %addr, "failed to clone stream");
            return;
        }
    };
    let peer = state.connections.register(write_half, addr);
    tracing::info!(connection = peer.id, %addr, "client connected");

    let mut reason = TeardownReason::PeerClosed;
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    'read: while state.is_running() {
        let n = match stream.read(&mut chunk) {
            Ok(0) => {
                tracing::info!(connection = peer.id, "peer closed connection");
                break;
            }
            Ok(n) => n,
            Err(error) => {
                tracing::debug!(connection = peer.id, %error, "read failed");
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..n]);

        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..newline]);
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if !process_line(state, &peer, line) {
                reason = TeardownReason::ProtocolViolation;
                break 'read;
            }
        }

        // An unterminated frame beyond the cap is a protocol violation.
        if buffer.len() > MAX_FRAME_LEN {
            tracing::warn!(connection = peer.id, "frame buffer overflow");
            let reply = Message::error("frame too long").with_data("disconnect", "true");
            let _ignored = peer.send(&reply);
            reason = TeardownReason::ProtocolViolation;
            break;
        }
    }

    teardown(state, &peer, reason);
}

/// Routes one frame and executes the plan. Returns `false` when the
/// connection must be torn down (disconnect-marked reply).
fn process_line(state: &Arc<SharedState>, peer: &PeerConnection, line: &str) -> bool {
    // A handler panic must not kill the worker; the peer gets a generic
    // internal error instead.
    let plan = match panic::catch_unwind(AssertUnwindSafe(|| {
        state.router.process(line, peer.id)
    })) {
        Ok(plan) => plan,
        Err(_panic) => {
            tracing::error!(connection = peer.id, "handler panicked");
            let _ignored = peer.send(&Message::error("internal server error"));
            return true;
        }
    };
    deliver(state, peer, &plan)
}

/// Executes a delivery plan in order. Returns `false` if a reply carried the
/// disconnect marker.
fn deliver(state: &Arc<SharedState>, origin: &PeerConnection, plan: &[Outbound]) -> bool {
    let mut keep_alive = true;
    for outbound in plan {
        match &outbound.mode {
            DeliveryMode::Reply => {
                if let Err(error) = origin.send(&outbound.message) {
                    tracing::warn!(connection = origin.id, %error, "reply send failed");
                }
                if outbound.message.data("disconnect") == Some("true") {
                    keep_alive = false;
                }
            }
            DeliveryMode::Targeted(name) => {
                send_to_player(state, name, &outbound.message);
            }
            DeliveryMode::Broadcast { room, exclude } => {
                for member in state.rooms.members_of(room) {
                    if member != *exclude {
                        send_to_player(state, &member, &outbound.message);
                    }
                }
            }
        }
    }
    keep_alive
}

/// Targeted send via the registry's connection binding. Disconnected players
/// are skipped; send failures are logged and treated as that peer's problem.
pub(crate) fn send_to_player(state: &SharedState, name: &str, message: &Message) {
    let Some(connection) = state.players.connection_of(name) else {
        return;
    };
    let Some(peer) = state.connections.get(connection) else {
        return;
    };
    if let Err(error) = peer.send(message) {
        tracing::warn!(player = name, %error, "send failed");
    }
}

/// Disconnect teardown: preserve the session as temporarily disconnected,
/// notify the room, unbind the socket, close it.
fn teardown(state: &Arc<SharedState>, peer: &PeerConnection, reason: TeardownReason) {
    if let Some(name) = state.players.name_of(peer.id) {
        state.players.mark_temp_disconnected(&name);
        let room = state.players.room_of(&name);
        if !room.is_empty() {
            let notice = router::player_disconnected_message(&room, &name, reason.status());
            for member in state.rooms.members_of(&room) {
                if member != name {
                    send_to_player(state, &member, &notice);
                }
            }
        }
    }
    state.connections.remove(peer.id);
    peer.shutdown();
    tracing::info!(connection = peer.id, addr = %peer.addr, "connection closed");
}
