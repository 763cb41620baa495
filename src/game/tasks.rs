//! Proximity queries and the local task-progress timer

use std::collections::HashMap;

use crate::game::{PlayerState, TaskState};
use crate::net::protocol::Vec2;

/// How long a started task takes to finish, in milliseconds.
pub const TASK_DURATION_MS: f64 = 10_000.0;

/// Tolerance for "the player has not moved" while working a task.
const HOLD_STILL_EPSILON: f64 = 1e-9;

/// Task ids within `radius` of `position` that the given player could
/// start: not yet complete, and not claimed by someone else.
///
/// Results are ordered nearest-first (id as tiebreak) so callers get a
/// stable pick. Plain linear scan — the task table is small and fixed.
pub fn nearby_tasks(
    position: Vec2,
    radius: f64,
    tasks: &HashMap<String, TaskState>,
    player_id: &str,
) -> Vec<String> {
    let radius_sq = radius * radius;
    let mut hits: Vec<(f64, &str)> = tasks
        .values()
        .filter(|task| !task.is_complete)
        .filter(|task| task.completer.is_empty() || task.completer == player_id)
        .filter_map(|task| {
            let dist_sq = position.distance_squared(task.position);
            (dist_sq <= radius_sq).then_some((dist_sq, task.task_id.as_str()))
        })
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    hits.into_iter().map(|(_, id)| id.to_string()).collect()
}

/// Player ids within `range` of `position` that an impostor could kill:
/// alive and not themselves flagged impostor.
pub fn nearby_kill_targets(
    position: Vec2,
    range: f64,
    others: &HashMap<String, PlayerState>,
) -> Vec<String> {
    let range_sq = range * range;
    let mut hits: Vec<(f64, &str)> = others
        .values()
        .filter(|player| player.is_alive && !player.is_impostor)
        .filter_map(|player| {
            let dist_sq = position.distance_squared(player.position);
            (dist_sq <= range_sq).then_some((dist_sq, player.player_id.as_str()))
        })
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    hits.into_iter().map(|(_, id)| id.to_string()).collect()
}

/// Outcome of a task-progress tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskProgress {
    /// The fixed duration elapsed without the player moving.
    Completed(String),
    /// The player moved away before the duration elapsed.
    Cancelled(String),
}

#[derive(Debug, Clone)]
struct ActiveTask {
    task_id: String,
    started_at_ms: f64,
    start_position: Vec2,
}

/// The at-most-one in-flight task timer.
///
/// The session starts it (after sending the start command), ticks it with
/// the player's current position, and aborts it on elimination or
/// disconnect so no timer outlives the session.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    active: Option<ActiveTask>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_task(&self) -> Option<&str> {
        self.active.as_ref().map(|task| task.task_id.as_str())
    }

    /// Begin working a task. Refused while another task is in flight.
    pub fn start(&mut self, task_id: String, now_ms: f64, position: Vec2) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(ActiveTask {
            task_id,
            started_at_ms: now_ms,
            start_position: position,
        });
        true
    }

    /// Advance the timer. Movement interrupts progress; otherwise the task
    /// completes once the fixed duration has elapsed.
    pub fn tick(&mut self, now_ms: f64, position: Vec2) -> Option<TaskProgress> {
        let active = self.active.as_ref()?;

        if !position.approx_eq(active.start_position, HOLD_STILL_EPSILON) {
            let task_id = self.active.take().map(|task| task.task_id)?;
            return Some(TaskProgress::Cancelled(task_id));
        }

        if now_ms - active.started_at_ms >= TASK_DURATION_MS {
            let task_id = self.active.take().map(|task| task.task_id)?;
            return Some(TaskProgress::Completed(task_id));
        }

        None
    }

    /// Drop the in-flight task, returning its id so the caller can emit the
    /// cancel command. Used on elimination and transport teardown.
    pub fn abort(&mut self) -> Option<String> {
        self.active.take().map(|task| task.task_id)
    }
}
