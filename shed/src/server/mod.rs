//! Session engine: registries, router, connection manager, and heartbeat
//! supervisor.
//!
//! The server runs one OS thread per accepted client plus a single heartbeat
//! supervisor and the accept loop. All shared state lives behind the two
//! registries; handlers compute complete delivery plans under registry locks
//! and the connection layer performs every send after the locks are released.

pub mod connection;
pub mod heartbeat;
pub mod players;
pub mod rooms;
pub mod router;

use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

pub use players::{ConnectionId, PlayerRecord, PlayerRegistry};
pub use rooms::{JoinedRoom, LeftRoom, RoomRegistry, ROOM_CAPACITY};
pub use router::{DeliveryMode, Outbound, Router};

use connection::ConnectionTable;

/// Session-level failures. Like game errors, these become one-shot ERROR
/// replies; the connection survives.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid name")]
    InvalidName,
    #[error("must connect first")]
    MustConnectFirst,
    #[error("name already taken")]
    NameTaken,
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("not in any room")]
    NotInRoom,
    #[error("reconnection failed - player not found or not disconnected")]
    ReconnectRefused,
    #[error("server room limit reached")]
    RoomLimitReached,
}

/// Resolved configuration record consumed by the library. The binary layers
/// file and command-line sources on top of these defaults; the library never
/// reads files or environment variables itself.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    pub max_rooms: usize,
    pub player_timeout: Duration,
    pub heartbeat_check_interval: Duration,
    pub grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 8080,
            max_rooms: 15,
            player_timeout: Duration::from_secs(60),
            heartbeat_check_interval: Duration::from_secs(10),
            grace_period: Duration::from_secs(120),
        }
    }
}

/// State shared by the accept loop, client workers, and the supervisor.
pub(crate) struct SharedState {
    pub(crate) config: ServerConfig,
    pub(crate) players: Arc<PlayerRegistry>,
    pub(crate) rooms: Arc<RoomRegistry>,
    pub(crate) router: Router,
    pub(crate) connections: ConnectionTable,
    pub(crate) running: AtomicBool,
    shutdown_mutex: Mutex<()>,
    shutdown_cv: Condvar,
}

impl SharedState {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Blocks the supervisor for up to `timeout`; returns early on shutdown.
    pub(crate) fn wait_for_shutdown(&self, timeout: Duration) {
        let guard = self.shutdown_mutex.lock().unwrap();
        if self.is_running() {
            let _unused = self.shutdown_cv.wait_timeout(guard, timeout).unwrap();
        }
    }

    fn signal_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _guard = self.shutdown_mutex.lock().unwrap();
        self.shutdown_cv.notify_all();
    }
}

/// Cloneable handle for stopping a running server from another thread
/// (signal handlers, tests).
#[derive(Clone)]
pub struct ShutdownHandle {
    state: Arc<SharedState>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.state.signal_shutdown();
        self.state.connections.shutdown_all();
    }
}

/// A bound, not-yet-running server.
pub struct Server {
    listener: TcpListener,
    state: Arc<SharedState>,
}

impl Server {
    /// Binds the listener and wires up the registries. Pass port 0 to let
    /// the OS pick a free port (useful in tests).
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.ip.as_str(), config.port))?;
        tracing::info!(addr = %listener.local_addr()?, "listening");

        let players = Arc::new(PlayerRegistry::new());
        let rooms = Arc::new(RoomRegistry::new(config.max_rooms));
        let router = Router::new(Arc::clone(&players), Arc::clone(&rooms));
        let state = Arc::new(SharedState {
            config,
            players,
            rooms,
            router,
            connections: ConnectionTable::new(),
            running: AtomicBool::new(true),
            shutdown_mutex: Mutex::new(()),
            shutdown_cv: Condvar::new(),
        });
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until shutdown. Spawns the heartbeat supervisor
    /// and one worker thread per accepted client.
    pub fn run(self) -> io::Result<()> {
        let supervisor_state = Arc::clone(&self.state);
        let supervisor = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || heartbeat::run(supervisor_state))?;

        connection::accept_loop(&self.listener, &self.state);

        // Accept loop only exits on shutdown; wake the supervisor so it can
        // observe the flag and drain.
        self.state.signal_shutdown();
        let _joined = supervisor.join();
        tracing::info!("server stopped");
        Ok(())
    }
}
