//! Networking layer for client-server communication.
//!
//! The wire protocol is single-line framed text: one pipe-delimited message
//! per LF-terminated line. See [`messages`] for the codec and the compact
//! field-code table.

/// Blocking TCP client for connecting to a shed server.
pub mod client;

/// Message types and the line codec for the wire protocol.
pub mod messages;
