//! Domain-specific error types for the codebreak protocol.
//!
//! Framing and I/O failures surface as [`CodebreakError`], malformed
//! payloads as [`ProtocolError`], ledger misuse as [`LedgerError`] and
//! state-machine rejections as [`HandleError`]. Nothing on the message
//! path panics on peer input.

use std::time::Duration;
use thiserror::Error;

use crate::message::{MessageKind, Role};
use crate::state::State;

/// The canonical error type for transport-level failures.
#[derive(Debug, Error)]
pub enum CodebreakError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The frame did not start with the `ML` marker.
    #[error("invalid frame marker: expected ML")]
    InvalidMarker,

    /// The ASCII length field was missing, empty or too long.
    #[error("invalid frame length: {0}")]
    InvalidLength(&'static str),

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// UTF-8 conversion of a payload failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Application Errors ───────────────────────────────────────
    /// A payload could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A well-formed message arrived where another kind was required.
    #[error("unexpected {0} message")]
    UnexpectedMessage(MessageKind),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CodebreakError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CodebreakError::ChannelClosed
    }
}

// ── ProtocolError ────────────────────────────────────────────────

/// A colon-delimited payload failed tag, kind, shape or range validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Field 0 was not the protocol tag.
    #[error("missing protocol tag")]
    MissingTag,

    /// Field 1 named no known message kind.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// The kind was known but the field count was wrong.
    #[error("{kind}: expected {expected} fields, got {actual}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A field had the right position but an invalid value.
    #[error("{kind}: invalid {field} {value:?}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
}

// ── LedgerError ──────────────────────────────────────────────────

/// Misuse of the write-once round ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The round index is past the configured round budget.
    #[error("round {0} is out of range")]
    RoundOutOfRange(usize),

    /// The guess for this round was already recorded.
    #[error("guess for round {0} already recorded")]
    GuessAlreadyRecorded(usize),

    /// A score arrived before the round's guess.
    #[error("round {0} has no guess to score")]
    ScoreWithoutGuess(usize),

    /// The score for this round was already recorded.
    #[error("score for round {0} already recorded")]
    ScoreAlreadyRecorded(usize),
}

// ── HandleError ──────────────────────────────────────────────────

/// Why the session state machine refused an inbound message.
///
/// Every variant is fatal for one player's participation; [`culprit`]
/// names which one.
///
/// [`culprit`]: HandleError::culprit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The payload did not parse.
    #[error("malformed message from {from}: {source}")]
    Malformed {
        from: Role,
        #[source]
        source: ProtocolError,
    },

    /// The message kind is not accepted in the current state.
    #[error("{kind} not accepted from {from} in state {state}")]
    Unexpected {
        from: Role,
        kind: &'static str,
        state: State,
    },

    /// The message was well-formed but broke the round ledger.
    #[error("ledger rejected message from {from}: {source}")]
    Ledger {
        from: Role,
        #[source]
        source: LedgerError,
    },

    /// Forwarding to a player failed because their connection is gone.
    #[error("send to {to} failed")]
    SendFailed { to: Role },
}

impl HandleError {
    /// The player whose participation ends because of this error.
    pub fn culprit(&self) -> Role {
        match self {
            Self::Malformed { from, .. }
            | Self::Unexpected { from, .. }
            | Self::Ledger { from, .. } => *from,
            Self::SendFailed { to } => *to,
        }
    }
}

// ── ResumeError ──────────────────────────────────────────────────

/// Why a reconnecting player could not be put back into a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResumeError {
    /// No running session slot with that name and role is down.
    #[error("no down slot for {name} as {role}")]
    NoMatch { name: String, role: Role },

    /// The player was reinstalled but a follow-up send failed.
    #[error(transparent)]
    Send(#[from] HandleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;

    #[test]
    fn error_display_messages() {
        let e = CodebreakError::InvalidMarker;
        assert!(e.to_string().contains("ML"));

        let e = CodebreakError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CodebreakError = io_err.into();
        assert!(matches!(e, CodebreakError::Connection(_)));
    }

    #[test]
    fn from_protocol() {
        let e: CodebreakError = ProtocolError::MissingTag.into();
        assert!(matches!(e, CodebreakError::Protocol(ProtocolError::MissingTag)));
    }

    #[test]
    fn culprit_follows_attribution() {
        let rejected = HandleError::Unexpected {
            from: Role::Evaluator,
            kind: "CHOOSING_COLORS",
            state: State::Playing(Phase::Evaluating),
        };
        assert_eq!(rejected.culprit(), Role::Evaluator);

        let failed = HandleError::SendFailed { to: Role::Guesser };
        assert_eq!(failed.culprit(), Role::Guesser);
    }
}
