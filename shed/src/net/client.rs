//! A low-level blocking TCP shed client.
//!
//! This client is blocking and so is primarily used as a testing utility
//! rather than an actual game client.

use anyhow::{bail, Error};
use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpStream},
    thread,
    time::Duration,
};

use super::messages::{Message, MessageType};

/// Default timeout for reading from the server.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for writing to the server.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A blocking TCP client for connecting to a shed server.
///
/// Provides a synchronous interface for sending requests and receiving
/// replies one frame at a time.
#[derive(Debug)]
pub struct Client {
    /// The player name associated with this client.
    pub name: String,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    /// Connects to a server and registers `name` via CONNECT.
    ///
    /// Attempts the TCP connection three times with decreasing timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// server refuses the name.
    pub fn connect(name: &str, addr: &SocketAddr) -> Result<Self, Error> {
        let mut client = Self::open(addr)?;
        client.name = name.to_string();
        client.send(&Message::new(MessageType::Connect).with_data("name", name))?;
        let reply = client.recv()?;
        match reply.msg_type {
            MessageType::Connected => Ok(client),
            MessageType::Error => {
                bail!(
                    "connect refused: {}",
                    reply.data("error").unwrap_or_default()
                )
            }
            other => bail!("invalid server response: {other}"),
        }
    }

    /// Opens a fresh socket and reclaims an interrupted session via
    /// RECONNECT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not recognise the session.
    pub fn reconnect(name: &str, addr: &SocketAddr) -> Result<Self, Error> {
        let mut client = Self::open(addr)?;
        client.name = name.to_string();
        client.send(&Message::new(MessageType::Reconnect).with_data("name", name))?;
        let reply = client.recv()?;
        match reply.msg_type {
            MessageType::Connected => Ok(client),
            MessageType::Error => {
                bail!(
                    "reconnect refused: {}",
                    reply.data("error").unwrap_or_default()
                )
            }
            other => bail!("invalid server response: {other}"),
        }
    }

    fn open(addr: &SocketAddr) -> Result<Self, Error> {
        let mut connect_timeouts = vec![
            Duration::from_secs(1),
            Duration::from_millis(500),
            Duration::from_millis(100),
        ];
        while let Some(connect_timeout) = connect_timeouts.pop() {
            match TcpStream::connect_timeout(addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    let reader = BufReader::new(stream.try_clone()?);
                    return Ok(Self {
                        name: String::new(),
                        stream,
                        reader,
                    });
                }
                _ => thread::sleep(connect_timeout),
            }
        }
        bail!("couldn't connect to {addr}")
    }

    /// Sends one message frame.
    pub fn send(&mut self, message: &Message) -> Result<(), Error> {
        let mut frame = message.serialize();
        frame.push('\n');
        self.stream.write_all(frame.as_bytes())?;
        Ok(())
    }

    /// Sends raw bytes without framing or validation. Useful for driving
    /// the server's protocol-violation paths.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// Receives the next frame, whatever its type.
    pub fn recv(&mut self) -> Result<Message, Error> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            bail!("server closed connection");
        }
        Ok(Message::parse(&line)?)
    }

    /// Receives the next frame and insists on its type.
    pub fn recv_expect(&mut self, expected: MessageType) -> Result<Message, Error> {
        let msg = self.recv()?;
        if msg.msg_type != expected {
            bail!("expected {expected}, got {}: {}", msg.msg_type, msg.serialize());
        }
        Ok(msg)
    }

    /// Receives the next frame, which must be an ERROR; returns its text.
    pub fn recv_error(&mut self) -> Result<String, Error> {
        let msg = self.recv_expect(MessageType::Error)?;
        Ok(msg.data("error").unwrap_or_default().to_string())
    }

    pub fn ping(&mut self) -> Result<(), Error> {
        let msg = Message::new(MessageType::Ping).with_player(&self.name);
        self.send(&msg)
    }

    pub fn join_room(&mut self) -> Result<(), Error> {
        self.send(&Message::new(MessageType::JoinRoom))
    }

    pub fn leave_room(&mut self) -> Result<(), Error> {
        self.send(&Message::new(MessageType::LeaveRoom))
    }

    pub fn start_game(&mut self) -> Result<(), Error> {
        self.send(&Message::new(MessageType::StartGame))
    }

    /// Plays the given textual cards, e.g. `["5H", "5C"]`, or the single
    /// token `RESERVE`.
    pub fn play_cards(&mut self, cards: &[&str]) -> Result<(), Error> {
        self.send(&Message::new(MessageType::PlayCards).with_data("cards", cards.join(",")))
    }

    pub fn pickup_pile(&mut self) -> Result<(), Error> {
        self.send(&Message::new(MessageType::PickupPile))
    }
}
