//! # Shed
//!
//! A multiplayer shed card-game server built around a concurrent TCP session
//! engine. The library provides the complete server core: a line-framed text
//! protocol codec, the card/deck/rules model, a per-room game engine, player
//! and room registries, a message router, and a threaded connection manager
//! with heartbeat supervision.
//!
//! ## Core Modules
//!
//! - [`game`]: Card entities, play rules, and the per-room game state machine
//! - [`net`]: Wire protocol codec and a low-level blocking client
//! - [`server`]: Registries, router, connection manager, and supervisor
//!
//! ## Example
//!
//! ```no_run
//! use shed::server::{Server, ServerConfig};
//!
//! let server = Server::bind(ServerConfig::default()).unwrap();
//! server.run().unwrap();
//! ```

/// Card entities, play rules, and the game state machine.
pub mod game;

/// Wire protocol codec and client utilities.
pub mod net;

/// Session engine: registries, router, connection manager, supervisor.
pub mod server;

pub use game::{GameError, GamePhase, engine::GameState};
pub use net::{client::Client, messages};
pub use server::{Server, ServerConfig};
