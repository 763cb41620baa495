//! Drift-compensated extrapolation of remote players
//!
//! The server only pushes snapshots periodically; between pushes a remote
//! player's rendered position is projected forward from its last known
//! kinematic state. The projection is a pure read-time computation: it is
//! recomputed on every render sample and never written back to the
//! authoritative state.

use crate::game::navmesh::NavMesh;
use crate::game::{PlayerState, MOVE_SPEED};
use crate::net::protocol::Vec2;

/// Estimate where a remote player is right now.
///
/// `last_heard_ms` is on the server's clock; subtracting the smoothed
/// `drift_factor` converts it to this client's clock before measuring
/// elapsed time. The projected position goes through the same all-or-
/// nothing walkability rejection as local prediction, so the estimate never
/// shows a player inside a wall, even though it has no protocol effect.
pub fn estimate(player: &PlayerState, now_ms: f64, mesh: &NavMesh) -> Vec2 {
    if !player.is_alive {
        return player.position;
    }

    let elapsed_secs = ((now_ms - (player.last_heard_ms - player.drift_factor)) / 1000.0).max(0.0);
    let candidate = player
        .position
        .add(player.direction.scale(MOVE_SPEED * elapsed_secs));

    if mesh.is_walkable(candidate.x, candidate.y) {
        candidate
    } else {
        player.position
    }
}
