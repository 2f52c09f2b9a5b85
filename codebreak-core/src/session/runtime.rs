//! The per-room actor that owns a [`Session`] and drives it.
//!
//! One task per room selects over both players' inbound channels, the
//! heartbeat and watchdog timers, a control inbox and a cancellation
//! token. Nothing else touches the session, so it needs no locks.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Handshakes, Outcome, Seat, Session, SessionTiming, Settled, WatchdogAction};
use crate::error::{HandleError, ResumeError};
use crate::lobby::{Lobby, Player};
use crate::message::{DisconnectKind, Message, Role};
use crate::network::{Connection, ConnectionReceiver};
use crate::task::TaskPool;

// ── Events & reports ─────────────────────────────────────────────

/// Messages into a running session from outside its own loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// A player came back on a new connection. The reply hands the
    /// connection back when no down slot matches.
    Reconnect {
        name: String,
        role: Role,
        connection: Connection,
        reply: oneshot::Sender<Result<(), Connection>>,
    },
    /// A disconnect handshake finished, confirmed or not.
    HandshakeSettled(Settled),
    Shutdown,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Both players acknowledged the verdict.
    Completed,
    /// `departed` timed out, broke protocol or lost its connection for good.
    Abandoned { departed: Role },
    /// One player acknowledged the verdict and the other vanished.
    Stranded,
    /// Stopped from outside.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub room: u32,
    pub end: SessionEnd,
    pub rounds_played: usize,
    pub winner: Option<Role>,
}

// ── Handles ──────────────────────────────────────────────────────

/// A cloneable way to reach a running session.
#[derive(Debug, Clone)]
pub struct SessionLink {
    room: u32,
    events: mpsc::UnboundedSender<SessionEvent>,
    token: CancellationToken,
}

impl SessionLink {
    pub fn room(&self) -> u32 {
        self.room
    }

    /// Offer a reconnecting player to the session. On `Err` the
    /// connection comes back untouched.
    pub async fn reconnect(
        &self,
        name: String,
        role: Role,
        connection: Connection,
    ) -> Result<(), Connection> {
        let (reply, answer) = oneshot::channel();
        let event = SessionEvent::Reconnect {
            name,
            role,
            connection,
            reply,
        };
        match self.events.send(event) {
            Ok(()) => {}
            Err(mpsc::error::SendError(SessionEvent::Reconnect { connection, .. })) => {
                return Err(connection);
            }
            Err(_) => return Ok(()),
        }
        // A session that ends before answering dropped the connection with it.
        match answer.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    /// Ask the session to stop. Returns immediately.
    pub fn shutdown(&self) {
        if self.events.send(SessionEvent::Shutdown).is_err() {
            self.token.cancel();
        }
    }
}

/// The room manager's grip on a running session.
#[derive(Debug)]
pub struct SessionHandle {
    link: SessionLink,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn room(&self) -> u32 {
        self.link.room
    }

    pub fn link(&self) -> SessionLink {
        self.link.clone()
    }

    pub async fn reconnect(
        &self,
        name: String,
        role: Role,
        connection: Connection,
    ) -> Result<(), Connection> {
        self.link.reconnect(name, role, connection).await
    }

    pub fn shutdown(&self) {
        self.link.shutdown();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<SessionReport, JoinError> {
        self.task.await
    }
}

/// Start a session for two seated players on its own task. Both players
/// are returned to `lobby` when their part in the game ends normally.
pub fn spawn_session(
    room: u32,
    guesser: Player,
    evaluator: Player,
    timing: SessionTiming,
    lobby: Arc<dyn Lobby>,
    parent: &CancellationToken,
) -> SessionHandle {
    let token = parent.child_token();
    let (events, inbox) = mpsc::unbounded_channel();

    let (guesser_tx, guesser_rx) = guesser.connection.into_parts();
    let (evaluator_tx, evaluator_rx) = evaluator.connection.into_parts();
    let session = Session::new(
        room,
        Seat::new(guesser.name, guesser_tx),
        Seat::new(evaluator.name, evaluator_tx),
        timing,
    );

    let runner = SessionRunner {
        session,
        guesser_rx: Some(guesser_rx),
        evaluator_rx: Some(evaluator_rx),
        lobby,
        inbox,
        events: events.clone(),
        handshakes: Handshakes::new(),
        tasks: TaskPool::with_token(token.child_token()),
        token: token.clone(),
    };
    let task = tokio::spawn(runner.run());

    SessionHandle {
        link: SessionLink {
            room,
            events,
            token,
        },
        task,
    }
}

// ── SessionRunner ────────────────────────────────────────────────

struct SessionRunner {
    session: Session,
    guesser_rx: Option<ConnectionReceiver>,
    evaluator_rx: Option<ConnectionReceiver>,
    lobby: Arc<dyn Lobby>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    /// Cloned into handshake tasks so they can report back.
    events: mpsc::UnboundedSender<SessionEvent>,
    handshakes: Handshakes,
    tasks: TaskPool,
    token: CancellationToken,
}

/// Next payload from an optional receiver; pending forever without one.
async fn recv_from(rx: &mut Option<ConnectionReceiver>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl SessionRunner {
    async fn run(mut self) -> SessionReport {
        let timing = *self.session.timing();
        let room = self.session.room();
        self.session.start(Instant::now());
        info!(
            room,
            guesser = self.session.slot(Role::Guesser).name(),
            evaluator = self.session.slot(Role::Evaluator).name(),
            "session started"
        );

        let mut guesser_heartbeat = interval(timing.heartbeat_interval);
        let mut evaluator_heartbeat = interval(timing.heartbeat_interval);
        let mut watchdog = interval(timing.watchdog_tick);
        let mut status = interval(timing.status_interval);
        for timer in [
            &mut guesser_heartbeat,
            &mut evaluator_heartbeat,
            &mut watchdog,
            &mut status,
        ] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        let end = loop {
            let step = tokio::select! {
                _ = self.token.cancelled() => Some(SessionEnd::Shutdown),
                Some(event) = self.inbox.recv() => self.on_event(event).await,
                payload = recv_from(&mut self.guesser_rx) => self.on_payload(Role::Guesser, payload).await,
                payload = recv_from(&mut self.evaluator_rx) => self.on_payload(Role::Evaluator, payload).await,
                _ = guesser_heartbeat.tick() => {
                    self.session.ping(Role::Guesser);
                    None
                }
                _ = evaluator_heartbeat.tick() => {
                    self.session.ping(Role::Evaluator);
                    None
                }
                _ = watchdog.tick() => self.on_watchdog().await,
                _ = status.tick() => {
                    self.log_status();
                    None
                }
            };
            if let Some(end) = step {
                break end;
            }
        };

        self.session.stop();
        self.tasks.shutdown().await;
        let report = SessionReport {
            room,
            end,
            rounds_played: self.session.round(),
            winner: self.session.verdict(),
        };
        info!(room, end = ?report.end, rounds = report.rounds_played, "session ended");
        report
    }

    fn receiver_mut(&mut self, role: Role) -> &mut Option<ConnectionReceiver> {
        match role {
            Role::Guesser => &mut self.guesser_rx,
            Role::Evaluator => &mut self.evaluator_rx,
        }
    }

    async fn on_payload(&mut self, from: Role, payload: Option<String>) -> Option<SessionEnd> {
        let Some(payload) = payload else {
            // Reader gone. Staleness is the watchdog's call, unless this
            // was the last player yet to acknowledge the verdict.
            info!(room = self.session.room(), %from, "connection reader stopped");
            *self.receiver_mut(from) = None;
            return (self.session.kicked() > 0).then_some(SessionEnd::Stranded);
        };
        debug!(room = self.session.room(), %from, payload = %payload, "inbound");

        match self.session.handle(from, &payload, Instant::now()) {
            Ok(Outcome::Accepted) => None,
            Ok(Outcome::Confirmation(confirm)) => {
                if !self.handshakes.deliver(&confirm) {
                    debug!(room = self.session.room(), name = %confirm.name, "unexpected disconnect confirmation");
                }
                None
            }
            Ok(Outcome::Departed { role, finished }) => {
                self.release(role);
                finished.then_some(SessionEnd::Completed)
            }
            Err(e) => {
                warn!(room = self.session.room(), error = %e, culprit = %e.culprit(), "protocol violation");
                Some(self.teardown(e.culprit()).await)
            }
        }
    }

    async fn on_event(&mut self, event: SessionEvent) -> Option<SessionEnd> {
        match event {
            SessionEvent::Reconnect {
                name,
                role,
                connection,
                reply,
            } => {
                let (tx, rx) = connection.into_parts();
                match self.session.resume(&name, role, tx.clone(), Instant::now()) {
                    Ok(_) => {
                        *self.receiver_mut(role) = Some(rx);
                        let _ = reply.send(Ok(()));
                        None
                    }
                    Err(ResumeError::NoMatch { .. }) => {
                        debug!(room = self.session.room(), %name, %role, "reconnect did not match");
                        let _ = reply.send(Err(Connection::from_parts(tx, rx)));
                        None
                    }
                    Err(ResumeError::Send(e)) => {
                        *self.receiver_mut(role) = Some(rx);
                        let _ = reply.send(Ok(()));
                        warn!(room = self.session.room(), error = %e, "send failed during reconnect");
                        Some(self.teardown(e.culprit()).await)
                    }
                }
            }
            SessionEvent::HandshakeSettled(settled) => {
                if settled.confirmed {
                    info!(room = self.session.room(), kind = %settled.kind, name = %settled.name, "disconnect notice confirmed");
                } else {
                    warn!(room = self.session.room(), kind = %settled.kind, name = %settled.name, "disconnect notice unconfirmed");
                }
                None
            }
            SessionEvent::Shutdown => Some(SessionEnd::Shutdown),
        }
    }

    async fn on_watchdog(&mut self) -> Option<SessionEnd> {
        for action in self.session.watchdog_tick(Instant::now()) {
            match action {
                WatchdogAction::TemporaryDisconnect { role, notify_peer } => {
                    if notify_peer {
                        if let Err(e) = self.notify_temporary(role) {
                            return Some(self.teardown(e.culprit()).await);
                        }
                    }
                }
                WatchdogAction::PermanentDisconnect { role } => {
                    return Some(self.teardown(role).await);
                }
                WatchdogAction::Stranded => return Some(SessionEnd::Stranded),
            }
        }
        None
    }

    /// Send a temporary notice and track its confirmation in the background.
    /// Informational only: the pause is already in effect.
    fn notify_temporary(&mut self, gone: Role) -> Result<(), HandleError> {
        let Some((name, role)) = self.session.send_notice(DisconnectKind::Temporary, gone)? else {
            return Ok(());
        };
        let wait = self.handshakes.begin(
            DisconnectKind::Temporary,
            name,
            role,
            self.session.timing().temporary_confirm,
        );
        let events = self.events.clone();
        self.tasks.spawn("temporary-disconnect-confirmation", async move {
            let settled = wait.settled().await;
            let _ = events.send(SessionEvent::HandshakeSettled(settled));
        });
        Ok(())
    }

    /// Return a player and their live connection to the lobby.
    fn release(&mut self, role: Role) {
        let tx = self.session.take_outbound(role);
        let rx = self.receiver_mut(role).take();
        let name = self.session.slot(role).name().to_string();
        match (tx, rx) {
            (Some(tx), Some(rx)) => {
                info!(room = self.session.room(), %name, %role, "returning player to lobby");
                self.lobby.return_player(Player {
                    name,
                    role,
                    connection: Connection::from_parts(tx, rx),
                });
            }
            _ => debug!(room = self.session.room(), %name, %role, "player has no connection left"),
        }
    }

    /// Permanent disconnect of `departed`: stop, notify the survivor and
    /// wait for its confirmation (bounded), then hand the survivor back.
    async fn teardown(&mut self, departed: Role) -> SessionEnd {
        let room = self.session.room();
        self.session.stop();
        info!(room, %departed, "stopping session");

        self.session.take_outbound(departed);
        *self.receiver_mut(departed) = None;

        let survivor = departed.peer();
        match self.session.send_notice(DisconnectKind::Permanent, departed) {
            Ok(Some((name, role))) => {
                if self.await_permanent_confirmation(name, role).await {
                    info!(room, %survivor, "survivor confirmed the disconnect");
                } else {
                    warn!(room, %survivor, "no confirmation from survivor, returning them anyway");
                }
                self.release(survivor);
            }
            Ok(None) => {}
            Err(e) => warn!(room, error = %e, "could not notify survivor"),
        }
        SessionEnd::Abandoned { departed }
    }

    /// Read the survivor's channel until the confirmation arrives or the
    /// budget runs out. Nothing but the confirmation is acted on.
    async fn await_permanent_confirmation(&mut self, name: String, role: Role) -> bool {
        let budget = self.session.timing().permanent_confirm;
        let wait = self
            .handshakes
            .begin(DisconnectKind::Permanent, name, role, budget);
        let mut settled = std::pin::pin!(wait.settled());

        loop {
            let slot_rx = match role {
                Role::Guesser => &mut self.guesser_rx,
                Role::Evaluator => &mut self.evaluator_rx,
            };
            let Some(rx) = slot_rx.as_mut() else {
                return (&mut settled).await.confirmed;
            };
            tokio::select! {
                outcome = &mut settled => return outcome.confirmed,
                payload = rx.recv() => match payload {
                    Some(payload) => match Message::parse(&payload) {
                        Ok(Message::DisconnectConfirm(confirm)) => {
                            self.handshakes.deliver(&confirm);
                        }
                        _ => debug!(%role, payload = %payload, "ignored while stopping"),
                    },
                    None => *slot_rx = None,
                },
            }
        }
    }

    fn log_status(&mut self) {
        self.tasks.reap();
        let session = &self.session;
        debug!(
            room = session.room(),
            state = %session.state(),
            round = session.round(),
            paused = session.is_paused(),
            kicked = session.kicked(),
            guesser_valid = session.slot(Role::Guesser).is_valid(),
            evaluator_valid = session.slot(Role::Evaluator).is_valid(),
            "session status"
        );
    }
}
