//! Client-side movement and consistency core for a multiplayer
//! social-deduction game.
//!
//! The crate keeps two independently advancing clocks coherent: the local
//! prediction tick that moves the player's own avatar, and the server's
//! periodic snapshot stream that owns everything else. It covers:
//! - walkability checks against a discretized navmesh,
//! - local prediction with throttled outbound movement commands,
//! - drift-compensated extrapolation of remote players,
//! - pure snapshot reconciliation that never discards local prediction,
//! - the connection/session state machine gating all of the above,
//! - range-gated task and kill interactions.
//!
//! Rendering, UI composition, matchmaking and key-event wiring are
//! collaborator concerns: they feed an [`game::movement::InputState`] and
//! sample a [`session::GameView`].

pub mod config;
pub mod game;
pub mod net;
pub mod session;
pub mod util;

pub use game::navmesh::NavMesh;
pub use game::{GameState, PlayerState, TaskState};
pub use session::{ClientCommand, GameView, Session, SessionHandles, SessionStatus};
