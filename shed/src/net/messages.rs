//! Wire protocol codec.
//!
//! A message is one LF-terminated line (CR tolerated and stripped):
//!
//! ```text
//! <type>|<player>|<room>|<k1>=<v1>|<k2>=<v2>|...
//! ```
//!
//! Field keys and a handful of common values are shortened on the wire using
//! the compact-code table below; parsing applies the inverse substitution, so
//! handlers only ever see the verbose spellings. Numeric-looking tokens are
//! never substituted in either direction.

use std::fmt;

/// A buffered, unterminated frame larger than this forces a disconnect.
pub const MAX_FRAME_LEN: usize = 8 * 1024;

/// Highest type code the wire format admits; anything above is an invalid
/// frame rather than an unknown-but-parseable message.
const MAX_TYPE_CODE: u16 = 200;

/// Numeric message types. Client-to-server requests sit below 100,
/// server-to-client responses at 100 and above.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageType {
    Connect,
    JoinRoom,
    LeaveRoom,
    Ping,
    StartGame,
    Reconnect,
    PlayCards,
    PickupPile,
    Connected,
    RoomJoined,
    RoomLeft,
    Error,
    Pong,
    GameStarted,
    GameState,
    PlayerDisconnected,
    PlayerReconnected,
    TurnResult,
    GameOver,
}

impl MessageType {
    pub fn code(self) -> u16 {
        match self {
            Self::Connect => 0,
            Self::JoinRoom => 2,
            Self::LeaveRoom => 3,
            Self::Ping => 4,
            Self::StartGame => 5,
            Self::Reconnect => 6,
            Self::PlayCards => 7,
            Self::PickupPile => 8,
            Self::Connected => 100,
            Self::RoomJoined => 101,
            Self::RoomLeft => 102,
            Self::Error => 103,
            Self::Pong => 104,
            Self::GameStarted => 105,
            Self::GameState => 106,
            Self::PlayerDisconnected => 107,
            Self::PlayerReconnected => 109,
            Self::TurnResult => 111,
            Self::GameOver => 112,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let msg_type = match code {
            0 => Self::Connect,
            2 => Self::JoinRoom,
            3 => Self::LeaveRoom,
            4 => Self::Ping,
            5 => Self::StartGame,
            6 => Self::Reconnect,
            7 => Self::PlayCards,
            8 => Self::PickupPile,
            100 => Self::Connected,
            101 => Self::RoomJoined,
            102 => Self::RoomLeft,
            103 => Self::Error,
            104 => Self::Pong,
            105 => Self::GameStarted,
            106 => Self::GameState,
            107 => Self::PlayerDisconnected,
            109 => Self::PlayerReconnected,
            111 => Self::TurnResult,
            112 => Self::GameOver,
            _ => return None,
        };
        Some(msg_type)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Connect => "CONNECT",
            Self::JoinRoom => "JOIN_ROOM",
            Self::LeaveRoom => "LEAVE_ROOM",
            Self::Ping => "PING",
            Self::StartGame => "START_GAME",
            Self::Reconnect => "RECONNECT",
            Self::PlayCards => "PLAY_CARDS",
            Self::PickupPile => "PICKUP_PILE",
            Self::Connected => "CONNECTED",
            Self::RoomJoined => "ROOM_JOINED",
            Self::RoomLeft => "ROOM_LEFT",
            Self::Error => "ERROR",
            Self::Pong => "PONG",
            Self::GameStarted => "GAME_STARTED",
            Self::GameState => "GAME_STATE",
            Self::PlayerDisconnected => "PLAYER_DISCONNECTED",
            Self::PlayerReconnected => "PLAYER_RECONNECTED",
            Self::TurnResult => "TURN_RESULT",
            Self::GameOver => "GAME_OVER",
        };
        write!(f, "{repr}")
    }
}

/// Errors for frames the codec cannot turn into a [`Message`]. All of them
/// are hard protocol violations.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty frame")]
    Empty,
    #[error("invalid message type: {0}")]
    InvalidType(String),
    #[error("unknown message type code: {0}")]
    UnknownType(u16),
}

/// Single source-of-truth compact-code table; the reverse view is derived by
/// scanning the same entries. Covers field keys and the common field values.
const COMPACT_CODES: &[(&str, &str)] = &[
    // Field keys
    ("hand", "h"),
    ("reserves", "r"),
    ("opponent_hand", "oh"),
    ("opponent_reserves", "or"),
    ("opponent_name", "on"),
    ("top_card", "tc"),
    ("discard_pile_size", "dp"),
    ("deck_size", "dk"),
    ("must_play_low", "ml"),
    ("your_turn", "yt"),
    ("current_player", "cp"),
    ("status", "st"),
    ("name", "nm"),
    ("error", "er"),
    ("result", "rs"),
    ("cards", "cd"),
    ("winner", "wn"),
    ("reconnected_player", "rp"),
    ("disconnected_player", "dc"),
    ("broadcast_type", "bt"),
    ("joined_player", "jp"),
    ("players", "pl"),
    ("player_count", "pc"),
    ("room_full", "rf"),
    ("disconnect", "disc"),
    ("message", "msg"),
    ("reason", "rsn"),
    // Status values
    ("temporarily_disconnected", "temp"),
    ("reconnected", "recon"),
    ("success", "ok"),
    ("game_over", "end"),
    ("started", "start"),
    ("left", "lft"),
    ("timed_out", "tout"),
    ("invalid_message", "inv"),
    // Result values
    ("play_success", "pok"),
    ("pickup_success", "uok"),
    ("opponent_disconnect", "opdc"),
    // Other common values
    ("room_notification", "rnotif"),
];

fn compact(token: &str) -> &str {
    COMPACT_CODES
        .iter()
        .find(|(verbose, _)| *verbose == token)
        .map_or(token, |(_, code)| code)
}

fn expand(token: &str) -> &str {
    COMPACT_CODES
        .iter()
        .find(|(_, code)| *code == token)
        .map_or(token, |(verbose, _)| verbose)
}

/// Tokens that look numeric are carried verbatim so card counts and sizes
/// never collide with the code table.
fn is_numeric(token: &str) -> bool {
    let digits = token.trim_start_matches('-');
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A parsed or to-be-serialized protocol message. Data fields keep insertion
/// order so serialized output is deterministic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub msg_type: MessageType,
    pub player: String,
    pub room: String,
    data: Vec<(String, String)>,
}

impl Message {
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            player: String::new(),
            room: String::new(),
            data: Vec::new(),
        }
    }

    /// One-shot error reply carrying `error=<text>`.
    pub fn error(text: &str) -> Self {
        Self::new(MessageType::Error).with_data("error", text)
    }

    pub fn with_player(mut self, player: &str) -> Self {
        self.player = player.to_string();
        self
    }

    pub fn with_room(mut self, room: &str) -> Self {
        self.room = room.to_string();
        self
    }

    pub fn with_data(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.set_data(key, value);
        self
    }

    /// Sets a data field, replacing any existing value for the key.
    pub fn set_data(&mut self, key: &str, value: impl fmt::Display) {
        let value = value.to_string();
        match self.data.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.data.push((key.to_string(), value)),
        }
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_data(&self, key: &str) -> bool {
        self.data(key).is_some()
    }

    /// Serializes to one line without the trailing LF. Keys and known
    /// non-numeric values are written in compact form.
    pub fn serialize(&self) -> String {
        let mut out = format!("{}|{}|{}", self.msg_type.code(), self.player, self.room);
        for (key, value) in &self.data {
            let value = if is_numeric(value) {
                value.as_str()
            } else {
                compact(value)
            };
            out.push('|');
            out.push_str(compact(key));
            out.push('=');
            out.push_str(value);
        }
        out
    }

    /// Parses one frame. Total: every failure maps to a [`ParseError`].
    /// Missing player/room segments default to empty; data segments without
    /// a `=` are dropped; unrecognized keys are kept as-is.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut parts = line.split('|');

        let type_str = parts.next().unwrap_or_default();
        let code: u16 = type_str
            .parse()
            .ok()
            .filter(|&c| c <= MAX_TYPE_CODE)
            .ok_or_else(|| ParseError::InvalidType(type_str.to_string()))?;
        let msg_type = MessageType::from_code(code).ok_or(ParseError::UnknownType(code))?;

        let player = parts.next().unwrap_or_default().to_string();
        let room = parts.next().unwrap_or_default().to_string();

        let mut data = Vec::new();
        for part in parts {
            if let Some((key, value)) = part.split_once('=') {
                let value = if is_numeric(value) {
                    value.to_string()
                } else {
                    expand(value).to_string()
                };
                data.push((expand(key).to_string(), value));
            }
        }

        Ok(Self {
            msg_type,
            player,
            room,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_basic_request() {
        let msg = Message::new(MessageType::Connect).with_data("name", "Alice");
        assert_eq!(msg.serialize(), "0|||nm=Alice");
    }

    #[test]
    fn parse_basic_request() {
        let msg = Message::parse("0|||name=Alice").unwrap();
        assert_eq!(msg.msg_type, MessageType::Connect);
        assert_eq!(msg.player, "");
        assert_eq!(msg.room, "");
        assert_eq!(msg.data("name"), Some("Alice"));
    }

    #[test]
    fn parse_accepts_compact_spellings() {
        let msg = Message::parse("100|Alice||nm=Alice|st=ok").unwrap();
        assert_eq!(msg.msg_type, MessageType::Connected);
        assert_eq!(msg.data("name"), Some("Alice"));
        assert_eq!(msg.data("status"), Some("success"));
    }

    #[test]
    fn roundtrip_preserves_data() {
        let msg = Message::new(MessageType::GameState)
            .with_player("Alice")
            .with_room("ROOM_1")
            .with_data("hand", "5H,8C,JD")
            .with_data("reserves", 3)
            .with_data("top_card", "3D")
            .with_data("your_turn", true)
            .with_data("deck_size", 43);
        let parsed = Message::parse(&msg.serialize()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn numeric_values_are_never_substituted() {
        // "2" is a legal card count; it must survive even though short codes
        // exist for short tokens.
        let msg = Message::new(MessageType::RoomJoined).with_data("player_count", 2);
        let line = msg.serialize();
        assert!(line.ends_with("pc=2"));
        let parsed = Message::parse(&line).unwrap();
        assert_eq!(parsed.data("player_count"), Some("2"));
    }

    #[test]
    fn compact_substitution_is_an_involution() {
        for (verbose, code) in COMPACT_CODES {
            assert_eq!(expand(compact(verbose)), *verbose);
            assert_eq!(compact(expand(code)), *code);
        }
    }

    #[test]
    fn status_values_are_compacted() {
        let msg = Message::new(MessageType::PlayerDisconnected)
            .with_player("Alice")
            .with_data("status", "temporarily_disconnected");
        assert_eq!(msg.serialize(), "107|Alice||st=temp");
    }

    #[test]
    fn unknown_keys_pass_through() {
        let msg = Message::parse("4|||custom_key=custom_value").unwrap();
        assert_eq!(msg.data("custom_key"), Some("custom_value"));
    }

    #[test]
    fn data_without_separator_is_dropped() {
        let msg = Message::parse("4|||garbage|x=1").unwrap();
        assert!(!msg.has_data("garbage"));
        assert_eq!(msg.data("x"), Some("1"));
    }

    #[test]
    fn missing_segments_default_to_empty() {
        let msg = Message::parse("4").unwrap();
        assert_eq!(msg.msg_type, MessageType::Ping);
        assert_eq!(msg.player, "");
        assert_eq!(msg.room, "");
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert_eq!(Message::parse(""), Err(ParseError::Empty));
        assert_eq!(Message::parse("\r\n"), Err(ParseError::Empty));
        assert!(matches!(
            Message::parse("abc|x|y"),
            Err(ParseError::InvalidType(_))
        ));
        assert!(matches!(
            Message::parse("201|||"),
            Err(ParseError::InvalidType(_))
        ));
        assert!(matches!(
            Message::parse("-1|||"),
            Err(ParseError::InvalidType(_))
        ));
        // 1 and 108 sit inside the numeric range but are not assigned.
        assert_eq!(Message::parse("1||"), Err(ParseError::UnknownType(1)));
        assert_eq!(Message::parse("108||"), Err(ParseError::UnknownType(108)));
    }

    #[test]
    fn crlf_line_endings_are_stripped() {
        let msg = Message::parse("4|Alice|\r\n").unwrap();
        assert_eq!(msg.msg_type, MessageType::Ping);
        assert_eq!(msg.player, "Alice");
    }

    #[test]
    fn set_data_replaces_existing_key() {
        let mut msg = Message::new(MessageType::Error);
        msg.set_data("error", "first");
        msg.set_data("error", "second");
        assert_eq!(msg.data("error"), Some("second"));
        assert_eq!(msg.serialize(), "103|||er=second");
    }

    #[test]
    fn type_code_roundtrip() {
        for code in 0..=MAX_TYPE_CODE {
            if let Some(msg_type) = MessageType::from_code(code) {
                assert_eq!(msg_type.code(), code);
            }
        }
    }
}
