//! Per-state message handling.
//!
//! | State         | Accepted                                                  |
//! |---------------|-----------------------------------------------------------|
//! | Choosing      | PONG, CHOOSING_COLORS (evaluator), RECONNECT_OTHER_PLAYER_ACK |
//! | Guessing      | PONG, GUESSING_COLORS (guesser), WIN_GAME_ACK, RECONNECT_OTHER_PLAYER_ACK |
//! | Evaluating    | PONG, EVALUATION (evaluator), RECONNECT_OTHER_PLAYER_ACK  |
//! | EvaluatorDown | PONG, *_DISCONNECT_CONFIRM, GUESSING_COLORS (guesser)      |
//! | GuesserDown   | PONG, *_DISCONNECT_CONFIRM, EVALUATION (evaluator), WIN_GAME_ACK (evaluator) |
//! | BothDown      | *_DISCONNECT_CONFIRM                                      |
//!
//! Heartbeats from a player marked down still count: they are how the
//! watchdog notices a silent recovery. Anything else is an error
//! attributed to the sender.

use tokio::time::Instant;
use tracing::{debug, info};

use super::Session;
use crate::error::HandleError;
use crate::message::{Code, DisconnectConfirm, Message, Role, Score};
use crate::state::{DownSet, MAX_ROUNDS, Phase, State, is_last_round, is_winning_score};

/// What an accepted message asks of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handled entirely inside the session.
    Accepted,
    /// A disconnect confirmation for the pending handshakes.
    Confirmation(DisconnectConfirm),
    /// `role` acknowledged the verdict and should go back to the lobby.
    /// `finished` once both players have.
    Departed { role: Role, finished: bool },
}

impl Session {
    /// Apply one inbound payload from `from`.
    pub fn handle(&mut self, from: Role, payload: &str, now: Instant) -> Result<Outcome, HandleError> {
        let message =
            Message::parse(payload).map_err(|source| HandleError::Malformed { from, source })?;
        let state = self.state();
        if !self.running || self.slot(from).departed {
            return Err(self.unexpected(from, &message));
        }
        debug!(room = self.room, %from, %state, kind = %message.kind(), "handling message");

        match state {
            State::Playing(Phase::Choosing) => self.on_choosing(from, message, now),
            State::Playing(Phase::Guessing) => self.on_guessing(from, message, now),
            State::Playing(Phase::Evaluating) => self.on_evaluating(from, message, now),
            State::Down(set) if set == DownSet::EVALUATOR => self.on_evaluator_down(from, message, now),
            State::Down(set) if set == DownSet::GUESSER => self.on_guesser_down(from, message, now),
            State::Down(_) => self.on_both_down(from, message),
        }
    }

    fn on_choosing(&mut self, from: Role, message: Message, now: Instant) -> Result<Outcome, HandleError> {
        match (from, message) {
            (_, Message::Pong { .. }) => Ok(self.heartbeat(from, now)),
            (_, Message::ReconnectOtherPlayerAck) => Ok(Outcome::Accepted),
            (Role::Evaluator, Message::ChooseColors(code)) => {
                self.broadcast(&Message::ColorsChosen)?;
                self.secret = Some(code);
                self.progress.advance(Phase::Guessing);
                info!(room = self.room, "secret chosen");
                Ok(Outcome::Accepted)
            }
            (from, message) => Err(self.unexpected(from, &message)),
        }
    }

    fn on_guessing(&mut self, from: Role, message: Message, now: Instant) -> Result<Outcome, HandleError> {
        match (from, message) {
            (_, Message::Pong { .. }) => Ok(self.heartbeat(from, now)),
            (_, Message::ReconnectOtherPlayerAck) => Ok(Outcome::Accepted),
            (Role::Guesser, Message::Guess(code)) if self.accepts_guess() => {
                self.record_guess(code)?;
                self.broadcast(&Message::GuessAck(code))?;
                self.progress.advance(Phase::Evaluating);
                Ok(Outcome::Accepted)
            }
            (from, Message::WinAck) if self.verdict.is_some() => Ok(self.depart(from)),
            (from, message) => Err(self.unexpected(from, &message)),
        }
    }

    fn on_evaluating(&mut self, from: Role, message: Message, now: Instant) -> Result<Outcome, HandleError> {
        match (from, message) {
            (_, Message::Pong { .. }) => Ok(self.heartbeat(from, now)),
            (_, Message::ReconnectOtherPlayerAck) => Ok(Outcome::Accepted),
            (Role::Evaluator, Message::Evaluation(score)) => {
                self.record_score(score)?;
                self.broadcast(&Message::EvaluationAck(score))?;
                self.settle_round(score, &Role::ALL)?;
                self.progress.advance(Phase::Guessing);
                Ok(Outcome::Accepted)
            }
            (from, message) => Err(self.unexpected(from, &message)),
        }
    }

    fn on_evaluator_down(&mut self, from: Role, message: Message, now: Instant) -> Result<Outcome, HandleError> {
        match (from, message) {
            (_, Message::Pong { .. }) => Ok(self.heartbeat(from, now)),
            (_, Message::DisconnectConfirm(confirm)) => Ok(Outcome::Confirmation(confirm)),
            (Role::Guesser, Message::Guess(code)) if self.accepts_guess() => {
                self.record_guess(code)?;
                self.send_to(Role::Guesser, &Message::GuessAck(code))?;
                self.progress.set_last_valid(Phase::Evaluating);
                Ok(Outcome::Accepted)
            }
            (from, message) => Err(self.unexpected(from, &message)),
        }
    }

    fn on_guesser_down(&mut self, from: Role, message: Message, now: Instant) -> Result<Outcome, HandleError> {
        match (from, message) {
            (_, Message::Pong { .. }) => Ok(self.heartbeat(from, now)),
            (_, Message::DisconnectConfirm(confirm)) => Ok(Outcome::Confirmation(confirm)),
            (Role::Evaluator, Message::Evaluation(score)) => {
                self.record_score(score)?;
                self.send_to(Role::Evaluator, &Message::EvaluationAck(score))?;
                self.settle_round(score, &[Role::Evaluator])?;
                self.progress.set_last_valid(Phase::Guessing);
                Ok(Outcome::Accepted)
            }
            (Role::Evaluator, Message::WinAck) if self.verdict.is_some() => {
                Ok(self.depart(Role::Evaluator))
            }
            (from, message) => Err(self.unexpected(from, &message)),
        }
    }

    fn on_both_down(&mut self, from: Role, message: Message) -> Result<Outcome, HandleError> {
        match message {
            Message::DisconnectConfirm(confirm) => Ok(Outcome::Confirmation(confirm)),
            message => Err(self.unexpected(from, &message)),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn unexpected(&self, from: Role, message: &Message) -> HandleError {
        HandleError::Unexpected {
            from,
            kind: message.kind().as_str(),
            state: self.state(),
        }
    }

    fn heartbeat(&mut self, from: Role, now: Instant) -> Outcome {
        self.slot_mut(from).heartbeats.push_back(now);
        Outcome::Accepted
    }

    /// A guess needs a secret, no verdict yet and budget left.
    fn accepts_guess(&self) -> bool {
        self.secret.is_some() && self.verdict.is_none() && self.round < MAX_ROUNDS
    }

    fn record_guess(&mut self, code: Code) -> Result<(), HandleError> {
        self.ledger
            .record_guess(self.round, code)
            .map_err(|source| HandleError::Ledger {
                from: Role::Guesser,
                source,
            })
    }

    fn record_score(&mut self, score: Score) -> Result<(), HandleError> {
        self.ledger
            .record_score(self.round, score)
            .map_err(|source| HandleError::Ledger {
                from: Role::Evaluator,
                source,
            })
    }

    /// Announce a verdict if this score decides the game, then advance
    /// the round index.
    fn settle_round(&mut self, score: Score, recipients: &[Role]) -> Result<(), HandleError> {
        let winner = if is_winning_score(score.blacks) {
            Some(Role::Guesser)
        } else if is_last_round(self.round) {
            Some(Role::Evaluator)
        } else {
            None
        };

        if let Some(winner) = winner {
            self.verdict = Some(winner);
            info!(room = self.room, round = self.round, %winner, "game decided");
            for &role in recipients {
                if self.slot(role).outbound.is_some() {
                    self.send_to(role, &Message::WinGame(winner))?;
                }
            }
        }
        self.round += 1;
        Ok(())
    }

    fn depart(&mut self, role: Role) -> Outcome {
        self.slot_mut(role).departed = true;
        self.kicked += 1;
        info!(room = self.room, %role, kicked = self.kicked, "player acknowledged the verdict");
        Outcome::Departed {
            role,
            finished: self.kicked >= 2,
        }
    }
}
