//! One room's game: state, round ledger and both player slots.
//!
//! [`Session`] does no I/O of its own beyond `try_send` on the players'
//! outbound channels, so every transition can be driven directly from
//! tests. The async side lives in [`runtime`].

mod coordinator;
mod machine;
pub mod runtime;
mod watchdog;

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::HandleError;
use crate::message::{Code, Message, Role};
use crate::network::ConnectionSender;
use crate::state::{Phase, Progress, RoundLedger, State};

pub use coordinator::{ConfirmationWait, Handshakes, Settled};
pub use machine::Outcome;
pub use runtime::{
    SessionEnd, SessionEvent, SessionHandle, SessionLink, SessionReport, spawn_session,
};
pub use watchdog::WatchdogAction;

// ── SessionTiming ────────────────────────────────────────────────

/// Every interval and threshold a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Watchdog poll period.
    pub watchdog_tick: Duration,
    /// How often each player is pinged.
    pub heartbeat_interval: Duration,
    /// Idle time after which a player is temporarily down.
    pub transient_timeout: Duration,
    /// Idle time after which a player is gone for good.
    pub permanent_timeout: Duration,
    /// Period of the status log line.
    pub status_interval: Duration,
    /// How long to wait for a temporary-disconnect confirmation.
    pub temporary_confirm: Duration,
    /// How long to wait for a permanent-disconnect confirmation.
    pub permanent_confirm: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            watchdog_tick: Duration::from_millis(200),
            heartbeat_interval: Duration::from_millis(5000),
            transient_timeout: Duration::from_secs(7),
            permanent_timeout: Duration::from_secs(40),
            status_interval: Duration::from_millis(1000),
            temporary_confirm: 20 * Duration::from_millis(10),
            permanent_confirm: 20 * Duration::from_millis(30),
        }
    }
}

// ── PlayerSlot ───────────────────────────────────────────────────

/// A player being seated in a new session.
#[derive(Debug)]
pub struct Seat {
    pub name: String,
    pub sender: ConnectionSender,
}

impl Seat {
    pub fn new(name: impl Into<String>, sender: ConnectionSender) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

/// A session's record of one player.
///
/// An invalid slot that still has a name is transiently disconnected:
/// waiting for a reconnect or the permanent timeout.
#[derive(Debug)]
pub struct PlayerSlot {
    name: String,
    role: Role,
    outbound: Option<ConnectionSender>,
    valid: bool,
    departed: bool,
    last_seen: Instant,
    heartbeats: VecDeque<Instant>,
}

impl PlayerSlot {
    fn new(seat: Seat, role: Role, now: Instant) -> Self {
        Self {
            name: seat.name,
            role,
            outbound: Some(seat.sender),
            valid: true,
            departed: false,
            last_seen: now,
            heartbeats: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Has an outbound channel whose writer is still running.
    pub fn is_connected(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Already acknowledged the verdict and left for the lobby.
    pub fn has_departed(&self) -> bool {
        self.departed
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    fn send(&self, message: &Message) -> Result<(), HandleError> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or(HandleError::SendFailed { to: self.role })?;
        tx.try_send(message.encode())
            .map_err(|_| HandleError::SendFailed { to: self.role })
    }
}

// ── Session ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
    room: u32,
    progress: Progress,
    round: usize,
    secret: Option<Code>,
    ledger: RoundLedger,
    /// Winning role once a verdict was broadcast.
    verdict: Option<Role>,
    running: bool,
    paused: bool,
    kicked: u8,
    slots: [PlayerSlot; 2],
    timing: SessionTiming,
}

impl Session {
    /// A dormant session for two seated players.
    pub fn new(room: u32, guesser: Seat, evaluator: Seat, timing: SessionTiming) -> Self {
        let now = Instant::now();
        Self {
            room,
            progress: Progress::new(),
            round: 0,
            secret: None,
            ledger: RoundLedger::new(),
            verdict: None,
            running: false,
            paused: false,
            kicked: 0,
            slots: [
                PlayerSlot::new(guesser, Role::Guesser, now),
                PlayerSlot::new(evaluator, Role::Evaluator, now),
            ],
            timing,
        }
    }

    /// Begin play: both players count as freshly seen.
    pub fn start(&mut self, now: Instant) {
        for slot in &mut self.slots {
            slot.last_seen = now;
            slot.valid = true;
        }
        self.running = true;
    }

    /// Stop reacting to messages and timeouts. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn room(&self) -> u32 {
        self.room
    }

    pub fn state(&self) -> State {
        self.progress.state()
    }

    pub fn last_valid(&self) -> Phase {
        self.progress.last_valid()
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn secret(&self) -> Option<Code> {
        self.secret
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    pub fn verdict(&self) -> Option<Role> {
        self.verdict
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Players already routed back to the lobby after the verdict.
    pub fn kicked(&self) -> u8 {
        self.kicked
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    pub fn slot(&self, role: Role) -> &PlayerSlot {
        &self.slots[role.index()]
    }

    fn slot_mut(&mut self, role: Role) -> &mut PlayerSlot {
        &mut self.slots[role.index()]
    }

    /// Hand over a player's outbound channel, leaving the slot empty.
    pub fn take_outbound(&mut self, role: Role) -> Option<ConnectionSender> {
        self.slot_mut(role).outbound.take()
    }

    /// Send a ping to `role` if it has a connection. Failures are left
    /// for the watchdog to notice.
    pub fn ping(&self, role: Role) -> bool {
        let slot = self.slot(role);
        slot.outbound.is_some() && slot.send(&Message::Ping).is_ok()
    }

    fn send_to(&self, role: Role, message: &Message) -> Result<(), HandleError> {
        self.slot(role).send(message)
    }

    /// Send to every slot that still holds a connection.
    fn broadcast(&self, message: &Message) -> Result<(), HandleError> {
        for slot in self.slots.iter().filter(|slot| slot.outbound.is_some()) {
            slot.send(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::sync::mpsc;

    /// A started session plus the far end of both outbound channels.
    pub struct Table {
        pub session: Session,
        pub guesser: mpsc::Receiver<String>,
        pub evaluator: mpsc::Receiver<String>,
        pub start: Instant,
    }

    impl Table {
        pub fn new() -> Self {
            let (gtx, guesser) = mpsc::channel(64);
            let (etx, evaluator) = mpsc::channel(64);
            let mut session = Session::new(
                7,
                Seat::new("anna", gtx),
                Seat::new("bob", etx),
                SessionTiming::default(),
            );
            let start = Instant::now();
            session.start(start);
            Self {
                session,
                guesser,
                evaluator,
                start,
            }
        }

        /// Everything queued for `role` so far.
        pub fn drain(&mut self, role: Role) -> Vec<String> {
            let rx = match role {
                Role::Guesser => &mut self.guesser,
                Role::Evaluator => &mut self.evaluator,
            };
            let mut out = Vec::new();
            while let Ok(payload) = rx.try_recv() {
                out.push(payload);
            }
            out
        }

        pub fn send(&mut self, from: Role, payload: &str) -> Result<Outcome, HandleError> {
            self.session.handle(from, payload, self.start)
        }

        /// Drive the session to `Evaluating` in round 0.
        pub fn to_evaluating(&mut self) {
            self.send(Role::Evaluator, "LK:CHOOSING_COLORS:1234").unwrap();
            self.send(Role::Guesser, "LK:GUESSING_COLORS:1111").unwrap();
            self.drain(Role::Guesser);
            self.drain(Role::Evaluator);
        }
    }
}
