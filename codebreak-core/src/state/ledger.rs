//! Fixed-size record of every round's guess and feedback.

use std::fmt;

use crate::error::LedgerError;
use crate::message::{CODE_LENGTH, Code, MaybeCode, Score};

/// Round budget of one game.
pub const MAX_ROUNDS: usize = 10;

/// Four black pegs win.
pub fn is_winning_score(blacks: u8) -> bool {
    usize::from(blacks) == CODE_LENGTH
}

/// The round at `round` is the final one the budget allows.
pub fn is_last_round(round: usize) -> bool {
    round >= MAX_ROUNDS - 1
}

// ── RoundEntry ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundEntry {
    pub guess: Option<Code>,
    pub score: Option<Score>,
}

impl RoundEntry {
    /// Decode a `ggggbw` record. Unset guess digits mean an unplayed round,
    /// whose counts are ignored.
    pub fn parse_record(record: &str) -> Option<Self> {
        if record.len() != CODE_LENGTH + 2 || !record.is_ascii() {
            return None;
        }
        let (guess, counts) = record.split_at(CODE_LENGTH);
        if guess.bytes().all(|b| b == b'6') {
            return Some(RoundEntry::default());
        }
        let guess = Code::parse(guess)?;
        let mut digits = counts.bytes().map(|b| b.checked_sub(b'0'));
        let blacks = digits.next()??;
        let whites = digits.next()??;
        Some(RoundEntry {
            guess: Some(guess),
            score: Some(Score::new(blacks, whites)?),
        })
    }
}

/// `ggggbw`: guess digits (`6` when unset), then black and white counts.
impl fmt::Display for RoundEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let score = self.score.unwrap_or_default();
        write!(f, "{}{}{}", MaybeCode(&self.guess), score.blacks, score.whites)
    }
}

// ── RoundLedger ──────────────────────────────────────────────────

/// Write-once storage for guesses and scores, indexed by round.
#[derive(Debug, Clone, Default)]
pub struct RoundLedger {
    rounds: [RoundEntry; MAX_ROUNDS],
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_guess(&mut self, round: usize, guess: Code) -> Result<(), LedgerError> {
        let entry = self
            .rounds
            .get_mut(round)
            .ok_or(LedgerError::RoundOutOfRange(round))?;
        if entry.guess.is_some() {
            return Err(LedgerError::GuessAlreadyRecorded(round));
        }
        entry.guess = Some(guess);
        Ok(())
    }

    pub fn record_score(&mut self, round: usize, score: Score) -> Result<(), LedgerError> {
        let entry = self
            .rounds
            .get_mut(round)
            .ok_or(LedgerError::RoundOutOfRange(round))?;
        if entry.guess.is_none() {
            return Err(LedgerError::ScoreWithoutGuess(round));
        }
        if entry.score.is_some() {
            return Err(LedgerError::ScoreAlreadyRecorded(round));
        }
        entry.score = Some(score);
        Ok(())
    }

    pub fn entry(&self, round: usize) -> Option<&RoundEntry> {
        self.rounds.get(round)
    }

    pub fn entries(&self) -> &[RoundEntry; MAX_ROUNDS] {
        &self.rounds
    }
}
