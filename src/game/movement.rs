//! Local prediction: held-key input, movement advance, send throttling

use crate::game::navmesh::NavMesh;
use crate::game::MOVE_SPEED;
use crate::net::protocol::Vec2;

/// Direction components below this are snapped to exactly zero so a
/// near-zero float is never treated as "moving".
pub const DIRECTION_EPSILON: f64 = 1e-5;

/// Longest the client stays silent: a heartbeat (possibly with zero
/// direction) goes out at least this often, bounding both staleness and the
/// server's `LastHeard`-based movement allowance.
pub const SEND_WATCHDOG_MS: f64 = 100.0;

/// Movement keys the embedding input layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Up,
    Down,
    Left,
    Right,
}

/// Owned held-key state.
///
/// Input handlers update this value through `press`/`release`; the
/// prediction tick reads it. It deliberately replaces the source's
/// free-floating global key map.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl InputState {
    pub fn press(&mut self, key: MoveKey) {
        self.set(key, true);
    }

    pub fn release(&mut self, key: MoveKey) {
        self.set(key, false);
    }

    /// Drop all held keys (e.g. on focus loss).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn set(&mut self, key: MoveKey, held: bool) {
        match key {
            MoveKey::Up => self.up = held,
            MoveKey::Down => self.down = held,
            MoveKey::Left => self.left = held,
            MoveKey::Right => self.right = held,
        }
    }

    /// Resolve held keys to a movement direction.
    ///
    /// Opposite keys cancel; diagonals are normalized to unit length so
    /// diagonal travel is no faster than axial travel. Y grows downward.
    pub fn direction(&self) -> Vec2 {
        let dx = (self.right as i8 - self.left as i8) as f64;
        let dy = (self.down as i8 - self.up as i8) as f64;

        if dx == 0.0 && dy == 0.0 {
            return Vec2::ZERO;
        }

        let theta = dy.atan2(dx);
        let mut x = theta.cos();
        let mut y = theta.sin();

        // cos/sin of right angles leave ~1e-16 residues; snap them away.
        if x.abs() < DIRECTION_EPSILON {
            x = 0.0;
        }
        if y.abs() < DIRECTION_EPSILON {
            y = 0.0;
        }

        Vec2::new(x, y)
    }
}

/// A movement update that should go on the wire this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementFrame {
    pub position: Vec2,
    pub direction: Vec2,
}

/// Advances the local player between authoritative snapshots.
///
/// Owns the predicted position, the last-evaluated wall-clock instant (so
/// movement is frame-rate independent) and the send throttle state.
#[derive(Debug, Clone)]
pub struct Predictor {
    position: Vec2,
    last_tick_ms: f64,
    last_sent_direction: Vec2,
    last_send_ms: f64,
}

impl Predictor {
    /// Start predicting from the authoritative spawn position.
    pub fn new(position: Vec2, now_ms: f64) -> Self {
        Self {
            position,
            last_tick_ms: now_ms,
            last_sent_direction: Vec2::ZERO,
            // Negative infinity forces the first tick to heartbeat, seeding
            // the server's LastHeard for this connection.
            last_send_ms: f64::NEG_INFINITY,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Advance one tick: move by `MOVE_SPEED * elapsed` along `held`,
    /// rejecting the move in full if the target cell is not walkable, and
    /// decide whether a command must be sent.
    ///
    /// A command goes out when the held direction differs component-wise
    /// from the last direction actually sent, or when the watchdog interval
    /// has elapsed since the last send. Zero direction is only sent on the
    /// change itself and on watchdog heartbeats.
    pub fn tick(&mut self, held: Vec2, now_ms: f64, mesh: &NavMesh) -> Option<MovementFrame> {
        let elapsed_secs = ((now_ms - self.last_tick_ms) / 1000.0).max(0.0);
        self.last_tick_ms = now_ms;

        let candidate = self.position.add(held.scale(MOVE_SPEED * elapsed_secs));
        // All-or-nothing: no axis sliding, no partial movement.
        if mesh.is_walkable(candidate.x, candidate.y) {
            self.position = candidate;
        }

        let direction_changed = !held.approx_eq(self.last_sent_direction, DIRECTION_EPSILON);
        let watchdog_elapsed = now_ms - self.last_send_ms >= SEND_WATCHDOG_MS;
        if !direction_changed && !watchdog_elapsed {
            return None;
        }

        self.last_sent_direction = held;
        self.last_send_ms = now_ms;
        Some(MovementFrame {
            position: self.position,
            direction: held,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn held(keys: &[MoveKey]) -> Vec2 {
        let mut input = InputState::default();
        for &key in keys {
            input.press(key);
        }
        input.direction()
    }

    #[test]
    fn opposite_keys_cancel() {
        assert_eq!(held(&[MoveKey::Left, MoveKey::Right]), Vec2::ZERO);
        assert_eq!(held(&[MoveKey::Up, MoveKey::Down]), Vec2::ZERO);
        assert_eq!(
            held(&[MoveKey::Up, MoveKey::Down, MoveKey::Left, MoveKey::Right]),
            Vec2::ZERO
        );
    }

    #[test]
    fn axial_directions_are_exact_units() {
        assert_eq!(held(&[MoveKey::Right]), Vec2::new(1.0, 0.0));
        assert_eq!(held(&[MoveKey::Up]), Vec2::new(0.0, -1.0));
        // The right-angle residue of cos(pi/2) must snap to exactly zero.
        assert_eq!(held(&[MoveKey::Down]).x, 0.0);
    }

    #[test]
    fn diagonal_speed_equals_axial_speed() {
        let diagonal = held(&[MoveKey::Right, MoveKey::Down]);
        let magnitude = (diagonal.x * diagonal.x + diagonal.y * diagonal.y).sqrt();
        assert!((magnitude - 1.0).abs() < EPS);
        assert!((diagonal.x - std::f64::consts::FRAC_1_SQRT_2).abs() < EPS);
    }

    #[test]
    fn release_and_clear_reset_held_keys() {
        let mut input = InputState::default();
        input.press(MoveKey::Left);
        assert_eq!(input.direction(), Vec2::new(-1.0, 0.0));
        input.release(MoveKey::Left);
        assert_eq!(input.direction(), Vec2::ZERO);

        input.press(MoveKey::Up);
        input.press(MoveKey::Right);
        input.clear();
        assert_eq!(input.direction(), Vec2::ZERO);
    }

    #[test]
    fn advances_along_held_direction() {
        // Local player at (100,100), direction (1,0), speed 120, 0.5s
        // elapsed, open mesh: lands at (160,100).
        let mesh = NavMesh::open(1531, 1053);
        let mut predictor = Predictor::new(Vec2::new(100.0, 100.0), 0.0);

        let frame = predictor.tick(Vec2::new(1.0, 0.0), 500.0, &mesh).unwrap();
        assert_eq!(frame.position, Vec2::new(160.0, 100.0));
        assert_eq!(predictor.position(), Vec2::new(160.0, 100.0));
    }

    #[test]
    fn blocked_move_is_rejected_in_full() {
        // Wall from x=150 on: the 0.5s step would land at 160, inside the
        // wall, so the position must not change at all (no partial slide).
        let rows = (0..200)
            .map(|_| (0..200).map(|x| u8::from(x < 150)).collect())
            .collect();
        let mesh = NavMesh::from_rows(rows).unwrap();
        let mut predictor = Predictor::new(Vec2::new(100.0, 100.0), 0.0);

        predictor.tick(Vec2::new(1.0, 0.0), 500.0, &mesh);
        assert_eq!(predictor.position(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn first_tick_sends_heartbeat() {
        let mesh = NavMesh::open(10, 10);
        let mut predictor = Predictor::new(Vec2::new(5.0, 5.0), 0.0);

        let frame = predictor.tick(Vec2::ZERO, 25.0, &mesh);
        assert!(frame.is_some());
        assert_eq!(frame.unwrap().direction, Vec2::ZERO);
    }

    #[test]
    fn direction_change_sends_watchdog_gates_rest() {
        let mesh = NavMesh::open(1531, 1053);
        let mut predictor = Predictor::new(Vec2::new(100.0, 100.0), 0.0);
        predictor.tick(Vec2::ZERO, 25.0, &mesh); // initial heartbeat

        // New direction: sends immediately.
        assert!(predictor.tick(Vec2::new(1.0, 0.0), 50.0, &mesh).is_some());
        // Same direction shortly after: suppressed.
        assert!(predictor.tick(Vec2::new(1.0, 0.0), 75.0, &mesh).is_none());
        assert!(predictor.tick(Vec2::new(1.0, 0.0), 100.0, &mesh).is_none());
        // Watchdog fires 100ms after the last send.
        assert!(predictor.tick(Vec2::new(1.0, 0.0), 150.0, &mesh).is_some());
    }

    #[test]
    fn stopping_sends_once_then_suppresses_until_watchdog() {
        let mesh = NavMesh::open(1531, 1053);
        let mut predictor = Predictor::new(Vec2::new(100.0, 100.0), 0.0);
        predictor.tick(Vec2::new(1.0, 0.0), 25.0, &mesh);

        // Keys released: the stop itself is a direction change.
        let stop = predictor.tick(Vec2::ZERO, 50.0, &mesh).unwrap();
        assert_eq!(stop.direction, Vec2::ZERO);

        // Still idle: silent until the watchdog heartbeat.
        assert!(predictor.tick(Vec2::ZERO, 75.0, &mesh).is_none());
        assert!(predictor.tick(Vec2::ZERO, 125.0, &mesh).is_none());
        let heartbeat = predictor.tick(Vec2::ZERO, 150.0, &mesh).unwrap();
        assert_eq!(heartbeat.direction, Vec2::ZERO);
    }

    #[test]
    fn bounce_back_to_previous_direction_still_sends() {
        // A -> B -> A inside one watchdog window: each change is a change
        // against the last direction actually sent.
        let mesh = NavMesh::open(1531, 1053);
        let mut predictor = Predictor::new(Vec2::new(100.0, 100.0), 0.0);
        predictor.tick(Vec2::ZERO, 25.0, &mesh);

        assert!(predictor.tick(Vec2::new(1.0, 0.0), 30.0, &mesh).is_some());
        assert!(predictor.tick(Vec2::new(0.0, 1.0), 35.0, &mesh).is_some());
        assert!(predictor.tick(Vec2::new(1.0, 0.0), 40.0, &mesh).is_some());
    }

    #[test]
    fn elapsed_time_is_wall_clock_not_tick_count() {
        // One long 250ms gap moves as far as ten 25ms ticks.
        let mesh = NavMesh::open(1531, 1053);

        let mut slow = Predictor::new(Vec2::new(100.0, 100.0), 0.0);
        slow.tick(Vec2::new(1.0, 0.0), 250.0, &mesh);

        let mut fast = Predictor::new(Vec2::new(100.0, 100.0), 0.0);
        for i in 1..=10 {
            fast.tick(Vec2::new(1.0, 0.0), i as f64 * 25.0, &mesh);
        }

        assert!((slow.position().x - fast.position().x).abs() < 1e-6);
        assert_eq!(slow.position().x, 130.0);
    }
}
