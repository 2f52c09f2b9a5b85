//! Session bookkeeping that does no I/O: the round ledger and the
//! gameplay/down-set state model.

pub mod ledger;
pub mod phase;

pub use ledger::{MAX_ROUNDS, RoundEntry, RoundLedger, is_last_round, is_winning_score};
pub use phase::{DownSet, Phase, Progress, State};
