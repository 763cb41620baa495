//! Wire protocol message definitions
//! These are the JSON types exchanged with the authoritative game server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 2D vector, wire-compatible with the server's `{X, Y}` encoding.
///
/// Used for both positions (world units) and directions (unit-ish vectors).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn scale(self, scalar: f64) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn distance_squared(self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Component-wise comparison within `eps`. Direction-change detection
    /// must use this rather than identity of freshly built vectors.
    pub fn approx_eq(self, other: Vec2, eps: f64) -> bool {
        (self.x - other.x).abs() < eps && (self.y - other.y).abs() < eps
    }
}

/// Game status codes as the server encodes them (integer enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameStatus {
    /// Waiting in the lobby for enough players
    Lobby,
    /// Round in progress
    Playing,
    /// Terminal: all impostors dead or all tasks done
    CrewmatesWin,
    /// Terminal: impostors reached parity
    ImpostorsWin,
}

impl GameStatus {
    /// True for the two end-of-game codes.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::CrewmatesWin | GameStatus::ImpostorsWin)
    }
}

/// Unknown status code on the wire
#[derive(Debug, thiserror::Error)]
#[error("unknown game status code: {0}")]
pub struct UnknownStatus(pub u8);

impl TryFrom<u8> for GameStatus {
    type Error = UnknownStatus;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(GameStatus::Lobby),
            1 => Ok(GameStatus::Playing),
            2 => Ok(GameStatus::CrewmatesWin),
            3 => Ok(GameStatus::ImpostorsWin),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl From<GameStatus> for u8 {
    fn from(status: GameStatus) -> u8 {
        match status {
            GameStatus::Lobby => 0,
            GameStatus::Playing => 1,
            GameStatus::CrewmatesWin => 2,
            GameStatus::ImpostorsWin => 3,
        }
    }
}

/// One player's state as reported in a status envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub name: String,
    /// Hex color assigned by the server at game start
    pub color: String,
    pub is_alive: bool,
    pub is_impostor: bool,
    pub position: Vec2,
    pub direction: Vec2,
    /// Server clock instant at which the server last heard this player
    pub last_heard: DateTime<Utc>,
    /// Clock-offset estimate the server holds for this player (echoed;
    /// the client measures its own)
    #[serde(default)]
    pub drift_factor: f64,
}

/// One task's state as reported in a status envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSnapshot {
    /// Player id currently working the task; empty when unclaimed
    #[serde(default)]
    pub completer: String,
    pub is_complete: bool,
}

/// Authoritative state push (server -> client, periodic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusUpdate {
    pub game_id: String,
    pub status: GameStatus,
    /// Server clock instant at which the snapshot was taken
    pub timestamp: DateTime<Utc>,
    pub players: HashMap<String, PlayerSnapshot>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskSnapshot>,
}

/// Parsed inbound frame
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// JSON status envelope
    Status(StatusUpdate),
    /// Anything else: the one-shot assigned-player-id frame, or free-text
    /// lobby chatter
    Text(String),
}

/// Classify an inbound text frame.
///
/// The server sends the assigned player id as a bare string before any
/// envelope, and free text while the lobby fills; neither parses as an
/// envelope, so everything non-envelope is surfaced as `Text`.
pub fn parse_server_message(raw: &str) -> ServerMessage {
    if let Ok(update) = serde_json::from_str::<StatusUpdate>(raw) {
        return ServerMessage::Status(update);
    }
    if let Ok(text) = serde_json::from_str::<String>(raw) {
        return ServerMessage::Text(text);
    }
    ServerMessage::Text(raw.to_string())
}

/// Command sent to the server (client -> server)
///
/// Every action carries the sender id and a local timestamp; exactly one
/// payload group is populated. Absent fields are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientAction {
    pub player_id: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec2>,
    /// Client's smoothed clock-offset estimate, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_task: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill: Option<String>,
}

impl ClientAction {
    fn base(player_id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            player_id,
            timestamp,
            position: None,
            direction: None,
            drift: None,
            start_task: None,
            cancel_task: None,
            complete_task: None,
            kill: None,
        }
    }

    /// Movement update; a zero direction makes this the heartbeat.
    pub fn movement(
        player_id: String,
        timestamp: DateTime<Utc>,
        position: Vec2,
        direction: Vec2,
        drift: f64,
    ) -> Self {
        let mut action = Self::base(player_id, timestamp);
        action.position = Some(position);
        action.direction = Some(direction);
        action.drift = Some(drift);
        action
    }

    pub fn start_task(player_id: String, timestamp: DateTime<Utc>, task_id: String) -> Self {
        let mut action = Self::base(player_id, timestamp);
        action.start_task = Some(task_id);
        action
    }

    pub fn cancel_task(player_id: String, timestamp: DateTime<Utc>, task_id: String) -> Self {
        let mut action = Self::base(player_id, timestamp);
        action.cancel_task = Some(task_id);
        action
    }

    pub fn complete_task(player_id: String, timestamp: DateTime<Utc>, task_id: String) -> Self {
        let mut action = Self::base(player_id, timestamp);
        action.complete_task = Some(task_id);
        action
    }

    pub fn kill(player_id: String, timestamp: DateTime<Utc>, target_id: String) -> Self {
        let mut action = Self::base(player_id, timestamp);
        action.kill = Some(target_id);
        action
    }
}
