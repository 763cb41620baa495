//! Reconciliation: folding authoritative snapshots into local state
//!
//! `merge` is a pure function of (current state, one snapshot, receive
//! instant). The session task owns the state and applies messages in
//! arrival order, so purity here is what makes a tick racing a message
//! within the same event-loop turn harmless, and what makes duplicate or
//! reordered snapshot delivery a no-op.

use crate::game::{apply_task_snapshots, GameState, PlayerState};
use crate::net::protocol::StatusUpdate;
use crate::util::time::epoch_millis;

/// Fold one clock-offset observation into the smoothed estimate.
///
/// Exponential average with weight 1/2; drift is never overwritten
/// wholesale.
fn fold_drift(raw_offset: f64, previous: f64) -> f64 {
    (raw_offset + previous) / 2.0
}

/// Merge an authoritative snapshot into the game state.
///
/// Rules:
/// - a snapshot for a foreign game id is ignored (stale, not an error);
/// - a snapshot whose timestamp is not newer than the last applied one is
///   ignored, which makes `merge(merge(S, M), M) == merge(S, M)` hold
///   exactly;
/// - the local player's `position` is never taken from the snapshot (the
///   locally controlled avatar must not snap); liveness, direction,
///   last-heard and drift are. A dead local player gets no kinematic
///   updates at all — the caller observes the liveness flip and moves the
///   session to its eliminated state;
/// - remote players are upserted verbatim (their snapshot position is the
///   baseline the extrapolation engine projects from), with drift folded
///   through the exponential average;
/// - task entries overwrite completion/claimant for known ids only.
pub fn merge(current: &GameState, update: &StatusUpdate, received_at_ms: f64) -> GameState {
    if update.game_id != current.game_id {
        return current.clone();
    }

    let snapshot_ms = epoch_millis(&update.timestamp);
    if snapshot_ms <= current.last_update_ms {
        return current.clone();
    }

    let raw_offset = snapshot_ms - received_at_ms;
    let mut next = current.clone();
    next.last_update_ms = snapshot_ms;

    for (player_id, snap) in &update.players {
        if *player_id == next.local.player_id {
            if !snap.is_alive {
                next.local.is_alive = false;
                continue;
            }
            next.local.is_alive = true;
            next.local.is_impostor = snap.is_impostor;
            next.local.direction = snap.direction;
            next.local.last_heard_ms = epoch_millis(&snap.last_heard);
            next.local.drift_factor = fold_drift(raw_offset, next.local.drift_factor);
            continue;
        }

        match next.others.get_mut(player_id) {
            Some(player) => {
                player.name = snap.name.clone();
                player.color = snap.color.clone();
                player.is_alive = snap.is_alive;
                player.is_impostor = snap.is_impostor;
                player.position = snap.position;
                player.direction = snap.direction;
                player.last_heard_ms = epoch_millis(&snap.last_heard);
                player.drift_factor = fold_drift(raw_offset, player.drift_factor);
            }
            None => {
                // First sighting: created lazily, drift seeded with the
                // first measured offset.
                next.others.insert(
                    player_id.clone(),
                    PlayerState::from_snapshot(snap, raw_offset),
                );
            }
        }
    }

    apply_task_snapshots(&mut next.tasks, &update.tasks);

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testutil::*;
    use crate::net::protocol::{GameStatus, TaskSnapshot, Vec2};

    #[test]
    fn foreign_game_id_is_a_no_op() {
        let state = playing_state("me");
        let update = status_update(
            "some-other-game",
            GameStatus::Playing,
            5_000,
            vec![player_snapshot("me", 0.0, 0.0, 5_000)],
        );

        assert_eq!(merge(&state, &update, 5_000.0), state);
    }

    #[test]
    fn merge_is_idempotent() {
        let state = playing_state("me");
        let update = status_update(
            "game-1",
            GameStatus::Playing,
            2_000,
            vec![
                player_snapshot("me", 999.0, 999.0, 2_000),
                player_snapshot("them", 300.0, 300.0, 1_990),
            ],
        );

        let once = merge(&state, &update, 2_040.0);
        let twice = merge(&once, &update, 2_080.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn stale_and_duplicate_snapshots_are_ignored() {
        let state = playing_state("me"); // last applied at ts 1000
        let stale = status_update(
            "game-1",
            GameStatus::Playing,
            900,
            vec![player_snapshot("me", 0.0, 0.0, 900)],
        );
        assert_eq!(merge(&state, &stale, 950.0), state);

        let same_ts = status_update(
            "game-1",
            GameStatus::Playing,
            1_000,
            vec![player_snapshot("me", 0.0, 0.0, 1_000)],
        );
        assert_eq!(merge(&state, &same_ts, 1_050.0), state);
    }

    #[test]
    fn local_position_is_never_overwritten() {
        let mut state = playing_state("me");
        state.local.position = Vec2::new(160.0, 100.0); // locally predicted

        let mut snap = player_snapshot("me", 555.0, 555.0, 2_000);
        snap.direction = Vec2::new(0.0, 1.0);
        let update = status_update("game-1", GameStatus::Playing, 2_000, vec![snap]);

        let merged = merge(&state, &update, 2_000.0);
        assert_eq!(merged.local.position, Vec2::new(160.0, 100.0));
        // Non-position kinematics do follow the server.
        assert_eq!(merged.local.direction, Vec2::new(0.0, 1.0));
        assert_eq!(merged.local.last_heard_ms, 2_000.0);
    }

    #[test]
    fn dead_local_player_gets_no_kinematic_updates() {
        let mut state = playing_state("me");
        state.local.direction = Vec2::new(1.0, 0.0);
        let heard_before = state.local.last_heard_ms;

        let mut snap = player_snapshot("me", 0.0, 0.0, 2_000);
        snap.is_alive = false;
        snap.direction = Vec2::new(0.0, 1.0);
        let update = status_update("game-1", GameStatus::Playing, 2_000, vec![snap]);

        let merged = merge(&state, &update, 2_000.0);
        assert!(!merged.local.is_alive);
        assert_eq!(merged.local.direction, Vec2::new(1.0, 0.0));
        assert_eq!(merged.local.last_heard_ms, heard_before);
    }

    #[test]
    fn remote_players_are_upserted_verbatim() {
        let state = playing_state("me");
        assert!(state.others.is_empty());

        let mut first = status_update(
            "game-1",
            GameStatus::Playing,
            2_000,
            vec![
                player_snapshot("me", 100.0, 100.0, 2_000),
                player_snapshot("them", 300.0, 400.0, 1_995),
            ],
        );
        first.players.get_mut("them").unwrap().direction = Vec2::new(1.0, 0.0);

        // Received 50ms after the server stamped it: raw offset -50.
        let merged = merge(&state, &first, 2_050.0);
        let them = &merged.others["them"];
        assert_eq!(them.position, Vec2::new(300.0, 400.0));
        assert_eq!(them.direction, Vec2::new(1.0, 0.0));
        assert_eq!(them.drift_factor, -50.0);

        // Second snapshot folds drift instead of replacing it:
        // (-30 + -50) / 2 = -40.
        let second = status_update(
            "game-1",
            GameStatus::Playing,
            3_000,
            vec![player_snapshot("them", 320.0, 400.0, 2_995)],
        );
        let merged = merge(&merged, &second, 3_030.0);
        let them = &merged.others["them"];
        assert_eq!(them.position, Vec2::new(320.0, 400.0));
        assert_eq!(them.drift_factor, -40.0);
    }

    #[test]
    fn absence_from_a_snapshot_is_not_removal() {
        let state = playing_state("me");
        let sighting = status_update(
            "game-1",
            GameStatus::Playing,
            2_000,
            vec![
                player_snapshot("me", 100.0, 100.0, 2_000),
                player_snapshot("them", 300.0, 400.0, 2_000),
            ],
        );
        let merged = merge(&state, &sighting, 2_000.0);

        let without_them = status_update(
            "game-1",
            GameStatus::Playing,
            3_000,
            vec![player_snapshot("me", 100.0, 100.0, 3_000)],
        );
        let merged = merge(&merged, &without_them, 3_000.0);
        assert!(merged.others.contains_key("them"));
    }

    #[test]
    fn task_entries_overwrite_known_ids_only() {
        let state = playing_state("me");
        let mut update = status_update(
            "game-1",
            GameStatus::Playing,
            2_000,
            vec![player_snapshot("me", 100.0, 100.0, 2_000)],
        );
        update.tasks.insert(
            "engine-fuel".to_string(),
            TaskSnapshot {
                completer: "them".to_string(),
                is_complete: true,
            },
        );
        update.tasks.insert(
            "phantom-task".to_string(),
            TaskSnapshot {
                completer: String::new(),
                is_complete: true,
            },
        );

        let merged = merge(&state, &update, 2_000.0);
        assert!(merged.tasks["engine-fuel"].is_complete);
        assert_eq!(merged.tasks["engine-fuel"].completer, "them");
        assert_eq!(merged.tasks.len(), 5);
    }
}
