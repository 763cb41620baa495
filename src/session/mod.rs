//! Session lifecycle: connection state machine and the client event loop
//!
//! The session task is the single owner of the game state. Inbound
//! transport events, user commands and the two tick timers all funnel into
//! one `select!` loop, so every mutation happens in one place, in arrival
//! order, and stops the moment the loop is dropped.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::extrapolate;
use crate::game::movement::{InputState, Predictor};
use crate::game::navmesh::NavMesh;
use crate::game::reconcile::merge;
use crate::game::tasks::{nearby_kill_targets, nearby_tasks, TaskProgress, TaskRunner};
use crate::game::{GameState, KILL_RANGE, TASK_RANGE};
use crate::net::protocol::{ClientAction, GameStatus, ServerMessage, StatusUpdate, Vec2};
use crate::net::transport::{self, TransportError, TransportEvent};
use crate::util::time::{epoch_millis, MOVEMENT_TICK, TASK_TICK};

/// Session lifecycle states.
///
/// `Eliminated`, `Won` and `Lost` are terminal: once reached, no inbound
/// message can undo the outcome. The failure states are terminal for this
/// session object; recovery is a fresh [`Session::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Transport being established
    Loading,
    /// Connected, waiting for the game to start
    Lobby,
    /// Round in progress; prediction and extrapolation active
    Playing,
    /// The local player was killed
    Eliminated,
    Won,
    Lost,
    /// Transport-level error; a manual reconnect rebuilds everything
    Error,
    /// Transport closed mid-session
    Disconnected,
    /// Transport closed before it ever opened
    ConnectionFailed,
}

impl SessionStatus {
    /// Game-outcome states that no later message may change.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Eliminated | SessionStatus::Won | SessionStatus::Lost
        )
    }

    /// Transport-failure states that end the session loop.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            SessionStatus::Error | SessionStatus::Disconnected | SessionStatus::ConnectionFailed
        )
    }

    /// Transport-open acknowledgment.
    pub fn on_transport_open(self) -> Self {
        match self {
            SessionStatus::Loading => SessionStatus::Lobby,
            other => other,
        }
    }

    /// Transport close. Terminal outcomes stick; a close before the open
    /// acknowledgment means the connection never came up at all.
    pub fn on_transport_closed(self) -> Self {
        match self {
            status if status.is_terminal() => status,
            SessionStatus::Loading => SessionStatus::ConnectionFailed,
            _ => SessionStatus::Disconnected,
        }
    }

    /// Transport-level error event.
    pub fn on_transport_error(self) -> Self {
        if self.is_terminal() {
            self
        } else {
            SessionStatus::Error
        }
    }

    /// Status code carried by a snapshot. The win/lose mapping flips with
    /// the local player's impostor flag: impostors win when the crew loses.
    pub fn on_game_status(self, code: GameStatus, local_is_impostor: bool) -> Self {
        match (self, code) {
            (SessionStatus::Lobby, GameStatus::Playing) => SessionStatus::Playing,
            (SessionStatus::Playing, GameStatus::CrewmatesWin) => {
                if local_is_impostor {
                    SessionStatus::Lost
                } else {
                    SessionStatus::Won
                }
            }
            (SessionStatus::Playing, GameStatus::ImpostorsWin) => {
                if local_is_impostor {
                    SessionStatus::Won
                } else {
                    SessionStatus::Lost
                }
            }
            (current, _) => current,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Lobby => "lobby",
            SessionStatus::Playing => "playing",
            SessionStatus::Eliminated => "eliminated",
            SessionStatus::Won => "won",
            SessionStatus::Lost => "lost",
            SessionStatus::Error => "error",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::ConnectionFailed => "connection-failed",
        };
        f.write_str(name)
    }
}

/// User intents from the embedding UI.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Begin working a task the player is standing next to
    StartTask(String),
    /// Kill a nearby crewmate (impostors only)
    Kill(String),
    /// Leave the session loop
    Quit,
}

/// Snapshot of render-relevant state, published after every mutation.
///
/// An external renderer samples this synchronously; remote positions are
/// projected per sample via [`GameView::remote_positions`] and never stored.
#[derive(Debug, Clone)]
pub struct GameView {
    pub status: SessionStatus,
    pub game: Option<GameState>,
}

impl GameView {
    /// Current drift-compensated draw position for every remote player.
    pub fn remote_positions(&self, now_ms: f64, mesh: &NavMesh) -> Vec<(String, Vec2)> {
        let Some(game) = &self.game else {
            return Vec::new();
        };
        game.others
            .iter()
            .map(|(id, player)| (id.clone(), extrapolate::estimate(player, now_ms, mesh)))
            .collect()
    }
}

/// Shared owned input state: written by input handlers, read by the
/// prediction tick.
pub type InputHandle = Arc<Mutex<InputState>>;

/// Shared render view, written by the session, read by the renderer.
pub type ViewHandle = Arc<RwLock<GameView>>;

/// The embedder's grip on a running session.
pub struct SessionHandles {
    pub input: InputHandle,
    pub view: ViewHandle,
    pub commands: mpsc::Sender<ClientCommand>,
    pub navmesh: Arc<NavMesh>,
}

/// One connection's worth of client state.
pub struct Session {
    status: SessionStatus,
    /// Player id from the server's one-shot welcome frame
    assigned_id: Option<String>,
    game: Option<GameState>,
    predictor: Option<Predictor>,
    tasks: TaskRunner,
    navmesh: Arc<NavMesh>,
    input: InputHandle,
    view: ViewHandle,
    events: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<ClientAction>,
    commands: mpsc::Receiver<ClientCommand>,
    quit: bool,
}

impl Session {
    /// Open the transport and assemble a session around it.
    ///
    /// A failed connect maps to the `ConnectionFailed` outcome at the
    /// caller; a later reconnect is simply another `connect` call — the new
    /// transport shares no state or ordering with the old one.
    pub async fn connect(
        config: &Config,
        navmesh: Arc<NavMesh>,
    ) -> Result<(Session, SessionHandles), TransportError> {
        let (events, outbound) =
            transport::connect(&config.server_url, &config.player_name).await?;

        let (command_tx, commands) = mpsc::channel(16);
        let input: InputHandle = Arc::new(Mutex::new(InputState::default()));
        let view: ViewHandle = Arc::new(RwLock::new(GameView {
            status: SessionStatus::Loading,
            game: None,
        }));

        let handles = SessionHandles {
            input: input.clone(),
            view: view.clone(),
            commands: command_tx,
            navmesh: navmesh.clone(),
        };

        let session = Session {
            status: SessionStatus::Loading,
            assigned_id: None,
            game: None,
            predictor: None,
            tasks: TaskRunner::new(),
            navmesh,
            input,
            view,
            events,
            outbound,
            commands,
            quit: false,
        };

        Ok((session, handles))
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Drive the session to its final status.
    ///
    /// Two fixed-period timers (movement/heartbeat and task progress) and
    /// the inbound event stream are the only wake-ups; dropping the loop
    /// cancels both timers, and the in-flight task timer is cancelled
    /// explicitly on the way out.
    pub async fn run(mut self) -> SessionStatus {
        let mut move_timer = interval(MOVEMENT_TICK);
        move_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut task_timer = interval(TASK_TICK);
        task_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            // Transport tasks are gone; treat as a close.
                            let next = self.status.on_transport_closed();
                            self.transition(next).await;
                            break;
                        }
                    }
                }
                _ = move_timer.tick() => {
                    self.drain_commands().await;
                    self.movement_tick().await;
                }
                _ = task_timer.tick() => {
                    self.task_tick().await;
                }
            }

            if self.quit || self.status.is_failure() {
                break;
            }
        }

        self.cancel_active_task().await;
        self.publish();
        info!(status = %self.status, "Session finished");
        self.status
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                let next = self.status.on_transport_open();
                self.transition(next).await;
            }
            TransportEvent::Message(message) => {
                if self.status.is_terminal() {
                    // No resurrection: late snapshots cannot undo the outcome.
                    return;
                }
                self.handle_message(message).await;
            }
            TransportEvent::Closed => {
                let next = self.status.on_transport_closed();
                self.transition(next).await;
            }
            TransportEvent::Errored(reason) => {
                warn!(error = %reason, "Transport error");
                let next = self.status.on_transport_error();
                self.transition(next).await;
            }
        }
    }

    async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Text(text) => {
                if self.assigned_id.is_none() {
                    info!(player_id = %text, "Player id assigned");
                    self.assigned_id = Some(text);
                } else {
                    // Free-text lobby chatter; nothing to apply.
                    debug!(text = %text, "Ignoring text frame");
                }
            }
            ServerMessage::Status(update) => self.handle_status(update).await,
        }
    }

    async fn handle_status(&mut self, update: StatusUpdate) {
        let received_at = Utc::now();
        let received_at_ms = epoch_millis(&received_at);

        match self.status {
            SessionStatus::Lobby => {
                if update.status != GameStatus::Playing {
                    return;
                }
                let Some(assigned_id) = self.assigned_id.clone() else {
                    warn!("Game started before a player id was assigned");
                    return;
                };
                match GameState::from_status(&update, &assigned_id, received_at_ms) {
                    Some(game) => {
                        self.predictor = Some(Predictor::new(game.local.position, received_at_ms));
                        self.game = Some(game);
                        self.transition(SessionStatus::Playing).await;
                    }
                    None => {
                        warn!(player_id = %assigned_id, "Started snapshot is missing the local player");
                    }
                }
            }
            SessionStatus::Playing => {
                let Some(current) = self.game.as_ref() else {
                    return;
                };
                let was_alive = current.local.is_alive;
                let merged = merge(current, &update, received_at_ms);
                let eliminated = was_alive && !merged.local.is_alive;
                let local_is_impostor = merged.local.is_impostor;
                self.game = Some(merged);
                self.publish();

                if update.status.is_terminal() {
                    let next = self.status.on_game_status(update.status, local_is_impostor);
                    self.transition(next).await;
                } else if eliminated {
                    self.transition(SessionStatus::Eliminated).await;
                }
            }
            _ => {
                debug!(status = %self.status, "Ignoring snapshot in this state");
            }
        }
    }

    /// One movement/heartbeat tick: read held keys, advance prediction,
    /// emit a command when the throttle says so.
    async fn movement_tick(&mut self) {
        if self.status != SessionStatus::Playing {
            return;
        }

        let held = self.input.lock().direction();
        let now = Utc::now();
        let now_ms = epoch_millis(&now);

        let action = {
            let (Some(game), Some(predictor)) = (self.game.as_mut(), self.predictor.as_mut())
            else {
                return;
            };
            if !game.local.is_alive {
                return;
            }

            let frame = predictor.tick(held, now_ms, &self.navmesh);
            game.local.position = predictor.position();
            game.local.direction = held;

            frame.map(|frame| {
                ClientAction::movement(
                    game.local.player_id.clone(),
                    now,
                    frame.position,
                    frame.direction,
                    game.local.drift_factor,
                )
            })
        };

        if let Some(action) = action {
            self.send(action).await;
        }
        self.publish();
    }

    /// One task-progress tick: movement interrupts, the fixed duration
    /// completes.
    async fn task_tick(&mut self) {
        if self.status != SessionStatus::Playing {
            return;
        }
        let Some(game) = self.game.as_ref() else {
            return;
        };
        if !game.local.is_alive {
            return;
        }

        let now = Utc::now();
        let progress = self.tasks.tick(epoch_millis(&now), game.local.position);
        let player_id = game.local.player_id.clone();

        match progress {
            Some(TaskProgress::Completed(task_id)) => {
                info!(task_id = %task_id, "Task complete");
                self.send(ClientAction::complete_task(player_id, now, task_id))
                    .await;
            }
            Some(TaskProgress::Cancelled(task_id)) => {
                debug!(task_id = %task_id, "Task interrupted by movement");
                self.send(ClientAction::cancel_task(player_id, now, task_id))
                    .await;
            }
            None => {}
        }
    }

    async fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                ClientCommand::StartTask(task_id) => self.start_task(task_id).await,
                ClientCommand::Kill(target_id) => self.kill(target_id).await,
                ClientCommand::Quit => {
                    info!("Quit requested");
                    self.quit = true;
                }
            }
        }
    }

    async fn start_task(&mut self, task_id: String) {
        if self.status != SessionStatus::Playing {
            return;
        }
        let Some(game) = self.game.as_ref() else {
            return;
        };
        if !game.local.is_alive {
            return;
        }

        let reachable = nearby_tasks(
            game.local.position,
            TASK_RANGE,
            &game.tasks,
            &game.local.player_id,
        );
        if !reachable.iter().any(|id| *id == task_id) {
            debug!(task_id = %task_id, "Task not startable from here");
            return;
        }

        let now = Utc::now();
        if !self
            .tasks
            .start(task_id.clone(), epoch_millis(&now), game.local.position)
        {
            debug!(task_id = %task_id, "A task is already in progress");
            return;
        }

        info!(task_id = %task_id, "Task started");
        let player_id = game.local.player_id.clone();
        self.send(ClientAction::start_task(player_id, now, task_id))
            .await;
    }

    async fn kill(&mut self, target_id: String) {
        if self.status != SessionStatus::Playing {
            return;
        }
        let Some(game) = self.game.as_ref() else {
            return;
        };
        if !game.local.is_alive || !game.local.is_impostor {
            return;
        }

        let targets = nearby_kill_targets(game.local.position, KILL_RANGE, &game.others);
        if !targets.iter().any(|id| *id == target_id) {
            debug!(target_id = %target_id, "Kill target out of range or invalid");
            return;
        }

        info!(target_id = %target_id, "Kill command");
        self.send(ClientAction::kill(
            game.local.player_id.clone(),
            Utc::now(),
            target_id,
        ))
        .await;
    }

    async fn transition(&mut self, next: SessionStatus) {
        if next == self.status {
            return;
        }
        info!(from = %self.status, to = %next, "Session transition");
        self.status = next;
        if self.status != SessionStatus::Playing {
            self.cancel_active_task().await;
        }
        self.publish();
    }

    /// Stop the in-flight task timer, telling the server if possible.
    async fn cancel_active_task(&mut self) {
        let Some(task_id) = self.tasks.abort() else {
            return;
        };
        let Some(game) = self.game.as_ref() else {
            return;
        };
        debug!(task_id = %task_id, "Cancelling in-flight task");
        self.send(ClientAction::cancel_task(
            game.local.player_id.clone(),
            Utc::now(),
            task_id,
        ))
        .await;
    }

    async fn send(&self, action: ClientAction) {
        if self.outbound.send(action).await.is_err() {
            debug!("Outbound channel closed; dropping action");
        }
    }

    fn publish(&self) {
        *self.view.write() = GameView {
            status: self.status,
            game: self.game.clone(),
        };
    }
}
