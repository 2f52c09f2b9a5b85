//! # codebreak-core
//!
//! Session engine for a two-player code-breaking game played over
//! persistent connections.
//!
//! This crate contains:
//! - **Codec**: `FrameCodec` for `ML<len><payload>` framing via `tokio_util`
//! - **Message**: the colon-delimited `LK:` payloads, parsed and encoded
//! - **Network**: `Connection`, a framed socket behind reader/writer tasks
//! - **State**: the round ledger and the gameplay/down-set state model
//! - **Session**: state machine, liveness watchdog, disconnect handshakes
//!   and the per-room runtime
//! - **Lobby**: the trait sessions hand finished players back through
//! - **Task**: `TaskPool` for tracked, cancellable background work
//! - **Error**: `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod lobby;
pub mod message;
pub mod network;
pub mod session;
pub mod state;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{FrameCodec, MAX_FRAME_SIZE};
pub use error::{CodebreakError, HandleError, LedgerError, ProtocolError, ResumeError};
pub use lobby::{Lobby, NoLobby, Player};
pub use message::{
    Code, Color, DisconnectConfirm, DisconnectKind, Message, MessageKind, ReconnectSnapshot,
    Role, Score,
};
pub use network::{Connection, ConnectionReceiver, ConnectionSender};
pub use session::{
    Outcome, Seat, Session, SessionEnd, SessionEvent, SessionHandle, SessionLink,
    SessionReport, SessionTiming, WatchdogAction, spawn_session,
};
pub use state::{DownSet, MAX_ROUNDS, Phase, RoundEntry, RoundLedger, State};
pub use task::TaskPool;
