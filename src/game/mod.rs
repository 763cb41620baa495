//! In-memory game model and movement/reconciliation engines

pub mod extrapolate;
pub mod movement;
pub mod navmesh;
pub mod reconcile;
pub mod tasks;

pub use navmesh::NavMesh;

use std::collections::HashMap;

use crate::net::protocol::{PlayerSnapshot, StatusUpdate, TaskSnapshot, Vec2};
use crate::util::time::epoch_millis;

/// Movement speed in world units per second.
///
/// Shared by every client and the server's anti-cheat allowance; the values
/// must match exactly or predicted and authoritative positions diverge.
pub const MOVE_SPEED: f64 = 120.0;

/// Maximum distance at which a kill command is worth sending.
pub const KILL_RANGE: f64 = 30.0;

/// Maximum distance at which a task can be started.
pub const TASK_RANGE: f64 = 30.0;

/// World rectangle matching the shipped map assets.
pub const WORLD_WIDTH: usize = 1531;
pub const WORLD_HEIGHT: usize = 1053;

/// One player's client-side state.
///
/// For the local player, `position` is owned by prediction and everything
/// else by the server; remote entries are server-owned throughout, with
/// `drift_factor` being the client's own clock-offset measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub player_id: String,
    pub name: String,
    pub color: String,
    pub is_alive: bool,
    pub is_impostor: bool,
    pub position: Vec2,
    pub direction: Vec2,
    /// Server-clock instant (Unix millis) the server last heard this player
    pub last_heard_ms: f64,
    /// Exponentially smoothed server-minus-local clock offset, millis
    pub drift_factor: f64,
}

impl PlayerState {
    /// Build from a snapshot entry, seeding drift with the first measured
    /// raw offset (there is nothing to average against yet).
    pub fn from_snapshot(snap: &PlayerSnapshot, drift_seed: f64) -> Self {
        Self {
            player_id: snap.player_id.clone(),
            name: snap.name.clone(),
            color: snap.color.clone(),
            is_alive: snap.is_alive,
            is_impostor: snap.is_impostor,
            position: snap.position,
            direction: snap.direction,
            last_heard_ms: epoch_millis(&snap.last_heard),
            drift_factor: drift_seed,
        }
    }
}

/// One task's client-side state.
///
/// Positions are pre-seeded; only the completion flag and claimant are ever
/// touched by snapshots. The client never mutates tasks on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub task_id: String,
    pub position: Vec2,
    pub is_complete: bool,
    /// Player id working or having finished the task; empty = unclaimed
    pub completer: String,
}

impl TaskState {
    fn new(task_id: &str, x: f64, y: f64) -> Self {
        Self {
            task_id: task_id.to_string(),
            position: Vec2::new(x, y),
            is_complete: false,
            completer: String::new(),
        }
    }

    /// The fixed task table for the shipped map. The protocol carries no
    /// task coordinates, so the set is seeded client-side and never grows.
    pub fn seed() -> HashMap<String, TaskState> {
        [
            TaskState::new("cafeteria-wiring", 830.0, 260.0),
            TaskState::new("weapons-calibrate", 1120.0, 240.0),
            TaskState::new("engine-fuel", 210.0, 410.0),
            TaskState::new("medbay-scan", 560.0, 490.0),
            TaskState::new("storage-clean", 760.0, 830.0),
        ]
        .into_iter()
        .map(|task| (task.task_id.clone(), task))
        .collect()
    }
}

/// The whole client-side view of one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub game_id: String,
    /// The locally controlled player
    pub local: PlayerState,
    /// Every other player ever sighted this session. Entries are created
    /// lazily and never removed: the protocol has no leave message, so
    /// absence from a snapshot only means "not heard about yet".
    pub others: HashMap<String, PlayerState>,
    pub tasks: HashMap<String, TaskState>,
    /// Server timestamp (Unix millis) of the last applied snapshot
    pub last_update_ms: f64,
}

impl GameState {
    /// Construct the initial state from the first in-progress snapshot.
    ///
    /// Returns `None` when the local player id is absent from the snapshot;
    /// the session stays in the lobby and waits for the next push.
    pub fn from_status(update: &StatusUpdate, local_id: &str, received_at_ms: f64) -> Option<Self> {
        let snapshot_ms = epoch_millis(&update.timestamp);
        let raw_offset = snapshot_ms - received_at_ms;

        let local = PlayerState::from_snapshot(update.players.get(local_id)?, raw_offset);

        let others = update
            .players
            .iter()
            .filter(|(id, _)| id.as_str() != local_id)
            .map(|(id, snap)| (id.clone(), PlayerState::from_snapshot(snap, raw_offset)))
            .collect();

        let mut tasks = TaskState::seed();
        apply_task_snapshots(&mut tasks, &update.tasks);

        Some(Self {
            game_id: update.game_id.clone(),
            local,
            others,
            tasks,
            last_update_ms: snapshot_ms,
        })
    }
}

/// Overwrite completion flag and claimant for known task ids; unknown ids
/// are ignored (the task set is fixed).
pub(crate) fn apply_task_snapshots(
    tasks: &mut HashMap<String, TaskState>,
    snapshots: &HashMap<String, TaskSnapshot>,
) {
    for (task_id, snap) in snapshots {
        if let Some(task) = tasks.get_mut(task_id) {
            task.is_complete = snap.is_complete;
            task.completer = snap.completer.clone();
        }
    }
}
