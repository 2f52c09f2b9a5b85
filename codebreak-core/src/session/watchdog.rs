//! Liveness polling: heartbeat replies in, pause/resume and disconnects out.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Session;
use crate::message::Role;

/// Work the watchdog hands back to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// `role` went quiet past the transient threshold. The session is
    /// already paused; `notify_peer` says whether the peer should hear of it.
    TemporaryDisconnect { role: Role, notify_peer: bool },
    /// `role` went quiet past the permanent threshold.
    PermanentDisconnect { role: Role },
    /// Only one player was left to acknowledge the verdict and their
    /// connection is gone.
    Stranded,
}

impl Session {
    /// Move queued heartbeat replies into `last_seen`.
    fn drain_heartbeats(&mut self) {
        for slot in &mut self.slots {
            while let Some(seen) = slot.heartbeats.pop_front() {
                slot.last_seen = slot.last_seen.max(seen);
            }
        }
    }

    /// One watchdog pass, evaluator first.
    pub fn watchdog_tick(&mut self, now: Instant) -> Vec<WatchdogAction> {
        if !self.running {
            return Vec::new();
        }
        self.drain_heartbeats();

        if self.kicked > 0 {
            let stranded = self
                .slots
                .iter()
                .filter(|slot| !slot.departed)
                .any(|slot| !slot.valid || !slot.is_connected());
            return if stranded {
                vec![WatchdogAction::Stranded]
            } else {
                Vec::new()
            };
        }

        let mut actions = Vec::new();
        for role in [Role::Evaluator, Role::Guesser] {
            let idle = now.saturating_duration_since(self.slot(role).last_seen);

            if idle > self.timing.permanent_timeout {
                warn!(room = self.room, %role, ?idle, "player timed out permanently");
                actions.push(WatchdogAction::PermanentDisconnect { role });
            } else if idle > self.timing.transient_timeout {
                if self.slot(role).valid {
                    self.progress.enter_down(role);
                    self.slot_mut(role).valid = false;
                    self.paused = true;
                    let peer = self.slot(role.peer());
                    let notify_peer =
                        peer.valid && peer.outbound.is_some() && !self.state().is_down(peer.role);
                    warn!(room = self.room, %role, ?idle, state = %self.state(), "player temporarily down");
                    actions.push(WatchdogAction::TemporaryDisconnect { role, notify_peer });
                }
            } else if !self.slot(role).valid {
                debug!(room = self.room, %role, "heartbeat resumed");
                self.slot_mut(role).valid = true;
            }
        }

        if self.paused && self.slots.iter().all(|slot| slot.valid) {
            info!(room = self.room, "both players live again, unpausing");
            self.paused = false;
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Table;
    use super::*;
    use crate::state::{Phase, State};
    use std::time::Duration;

    const PONG_G: &str = "LK:PONG:anna:0";
    const PONG_E: &str = "LK:PONG:bob:1";

    fn at(table: &Table, secs: u64) -> Instant {
        table.start + Duration::from_secs(secs)
    }

    #[test]
    fn quiet_guesser_goes_down_and_evaluator_is_told() {
        let mut table = Table::new();
        table.send(Role::Evaluator, "LK:CHOOSING_COLORS:1234").unwrap();

        // Evaluator keeps answering, guesser does not.
        let now = at(&table, 8);
        table.session.handle(Role::Evaluator, PONG_E, now).unwrap();
        let actions = table.session.watchdog_tick(now);

        assert_eq!(
            actions,
            vec![WatchdogAction::TemporaryDisconnect {
                role: Role::Guesser,
                notify_peer: true
            }]
        );
        assert_eq!(table.session.state(), State::GUESSER_DOWN);
        assert_eq!(table.session.last_valid(), Phase::Guessing);
        assert!(table.session.is_paused());
        assert!(!table.session.slot(Role::Guesser).is_valid());

        // Reported once, not on every tick.
        assert!(table.session.watchdog_tick(at(&table, 9)).is_empty());
    }

    #[test]
    fn both_quiet_is_both_down_without_notices() {
        let mut table = Table::new();
        let actions = table.session.watchdog_tick(at(&table, 10));
        assert_eq!(
            actions,
            vec![
                WatchdogAction::TemporaryDisconnect {
                    role: Role::Evaluator,
                    notify_peer: true
                },
                WatchdogAction::TemporaryDisconnect {
                    role: Role::Guesser,
                    notify_peer: false
                },
            ]
        );
        assert_eq!(table.session.state(), State::BOTH_DOWN);
        assert_eq!(table.session.last_valid(), Phase::Choosing);
    }

    #[test]
    fn fresh_heartbeat_silently_revalidates() {
        let mut table = Table::new();
        table.session.handle(Role::Evaluator, PONG_E, at(&table, 8)).unwrap();
        table.session.watchdog_tick(at(&table, 8));
        assert!(!table.session.slot(Role::Guesser).is_valid());

        table.session.handle(Role::Guesser, PONG_G, at(&table, 9)).unwrap();
        table.session.handle(Role::Evaluator, PONG_E, at(&table, 9)).unwrap();
        let actions = table.session.watchdog_tick(at(&table, 10));

        assert!(actions.is_empty());
        assert!(table.session.slot(Role::Guesser).is_valid());
        assert!(!table.session.is_paused());
        // No explicit transition without the reconnect handshake.
        assert_eq!(table.session.state(), State::GUESSER_DOWN);
    }

    #[test]
    fn both_past_the_ceiling_fire_permanent_in_order() {
        let mut table = Table::new();
        let actions = table.session.watchdog_tick(at(&table, 41));
        assert_eq!(
            actions,
            vec![
                WatchdogAction::PermanentDisconnect {
                    role: Role::Evaluator
                },
                WatchdogAction::PermanentDisconnect { role: Role::Guesser },
            ]
        );
    }

    #[test]
    fn exactly_seven_seconds_is_still_live() {
        let mut table = Table::new();
        let actions = table.session.watchdog_tick(at(&table, 7));
        assert!(actions.is_empty());
        assert_eq!(table.session.state(), State::Playing(Phase::Choosing));
        assert!(table.session.slot(Role::Guesser).is_valid());
        assert!(table.session.slot(Role::Evaluator).is_valid());
        assert!(!table.session.is_paused());
    }

    #[test]
    fn exactly_forty_seconds_is_still_transient() {
        let mut table = Table::new();
        let actions = table.session.watchdog_tick(at(&table, 40));
        assert_eq!(actions.len(), 2);
        assert!(actions
            .iter()
            .all(|a| matches!(a, WatchdogAction::TemporaryDisconnect { .. })));
    }

    #[test]
    fn timeouts_are_suspended_during_win_routing() {
        let mut table = Table::new();
        table.to_evaluating();
        table.send(Role::Evaluator, "LK:EVALUATION:4:0").unwrap();
        table.send(Role::Guesser, "LK:WIN_GAME_ACK").unwrap();

        assert!(table.session.watchdog_tick(at(&table, 100)).is_empty());

        table.session.take_outbound(Role::Evaluator);
        assert_eq!(
            table.session.watchdog_tick(at(&table, 101)),
            vec![WatchdogAction::Stranded]
        );
    }

    #[test]
    fn stopped_session_does_nothing() {
        let mut table = Table::new();
        table.session.stop();
        assert!(table.session.watchdog_tick(at(&table, 100)).is_empty());
    }
}
