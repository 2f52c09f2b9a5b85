//! Gameplay phases and the set of players currently marked down.
//!
//! ```text
//!  Choosing ──► Guessing ◄──► Evaluating
//!      │            │             │
//!      └────────────┼─────────────┘
//!                   ▼
//!        Down({GUESSER} | {EVALUATOR} | both)
//! ```
//!
//! A down set is entered by union and left by difference; once it is
//! empty the session resumes at the last valid [`Phase`].

use std::fmt;

use bitflags::bitflags;

use crate::message::Role;

// ── Phase ────────────────────────────────────────────────────────

/// A gameplay phase: the states a session can resume into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Choosing = 0,
    Guessing = 1,
    Evaluating = 2,
}

impl Phase {
    pub fn digit(self) -> u8 {
        self as u8
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Phase::Choosing),
            1 => Some(Phase::Guessing),
            2 => Some(Phase::Evaluating),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Choosing => f.write_str("Choosing"),
            Phase::Guessing => f.write_str("Guessing"),
            Phase::Evaluating => f.write_str("Evaluating"),
        }
    }
}

// ── DownSet ──────────────────────────────────────────────────────

bitflags! {
    /// Players whose connection went stale past the transient threshold.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DownSet: u8 {
        const GUESSER   = 0b01;
        const EVALUATOR = 0b10;
    }
}

impl DownSet {
    pub fn of(role: Role) -> Self {
        match role {
            Role::Guesser => DownSet::GUESSER,
            Role::Evaluator => DownSet::EVALUATOR,
        }
    }

    pub fn has(self, role: Role) -> bool {
        self.contains(DownSet::of(role))
    }
}

// ── State ────────────────────────────────────────────────────────

/// The session's current state. `Down` never holds an empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Playing(Phase),
    Down(DownSet),
}

impl Default for State {
    fn default() -> Self {
        State::Playing(Phase::Choosing)
    }
}

impl State {
    pub const EVALUATOR_DOWN: State = State::Down(DownSet::EVALUATOR);
    pub const GUESSER_DOWN: State = State::Down(DownSet::GUESSER);
    pub const BOTH_DOWN: State = State::Down(DownSet::all());

    pub fn phase(self) -> Option<Phase> {
        match self {
            State::Playing(phase) => Some(phase),
            State::Down(_) => None,
        }
    }

    pub fn down_set(self) -> DownSet {
        match self {
            State::Playing(_) => DownSet::empty(),
            State::Down(set) => set,
        }
    }

    pub fn is_down(self, role: Role) -> bool {
        self.down_set().has(role)
    }

    pub fn is_both_down(self) -> bool {
        self.down_set().is_all()
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Playing(Phase::Choosing) => "Choosing",
            State::Playing(Phase::Guessing) => "Guessing",
            State::Playing(Phase::Evaluating) => "Evaluating",
            State::Down(set) if set == DownSet::EVALUATOR => "EvaluatorDown",
            State::Down(set) if set == DownSet::GUESSER => "GuesserDown",
            State::Down(_) => "BothDown",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Progress ─────────────────────────────────────────────────────

/// Current state plus the phase to resume into after recovery.
///
/// `last_valid` is only ever a gameplay phase and is never written
/// while both players are down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    state: State,
    last_valid: Phase,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_valid(&self) -> Phase {
        self.last_valid
    }

    /// Gameplay transition. Only valid while playing.
    pub fn advance(&mut self, phase: Phase) {
        debug_assert!(matches!(self.state, State::Playing(_)));
        self.state = State::Playing(phase);
    }

    /// Move the resume point while a single player is down, so that
    /// recovery lands on the phase the surviving player already reached.
    pub fn set_last_valid(&mut self, phase: Phase) {
        if !self.state.is_both_down() {
            self.last_valid = phase;
        }
    }

    /// Snapshot the current phase as the resume point, if playing.
    pub fn snapshot(&mut self) {
        if let State::Playing(phase) = self.state {
            self.last_valid = phase;
        }
    }

    /// Mark `role` down: snapshot when leaving gameplay, then union.
    pub fn enter_down(&mut self, role: Role) {
        self.snapshot();
        self.state = State::Down(self.state.down_set() | DownSet::of(role));
    }

    /// Clear `role` from the down set. An emptied set resumes `last_valid`.
    pub fn recover(&mut self, role: Role) {
        let State::Down(set) = self.state else {
            return;
        };
        let remaining = set - DownSet::of(role);
        self.state = if remaining.is_empty() {
            State::Playing(self.last_valid)
        } else {
            State::Down(remaining)
        };
    }
}
