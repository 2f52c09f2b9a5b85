//! Disconnect notices, their confirmation handshakes, and reconnection.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};

use super::Session;
use crate::error::{HandleError, ResumeError};
use crate::message::{DisconnectConfirm, DisconnectKind, Message, ReconnectSnapshot, Role};
use crate::network::ConnectionSender;

// ── Handshakes ───────────────────────────────────────────────────

#[derive(Debug)]
struct Pending {
    kind: DisconnectKind,
    name: String,
    role: Role,
    tx: oneshot::Sender<()>,
}

/// Outstanding disconnect notices awaiting the peer's confirmation.
#[derive(Debug, Default)]
pub struct Handshakes {
    pending: Vec<Pending>,
}

impl Handshakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a `kind` confirmation from `name`/`role` within `budget`.
    /// Replaces an older wait for the same confirmation.
    pub fn begin(
        &mut self,
        kind: DisconnectKind,
        name: String,
        role: Role,
        budget: Duration,
    ) -> ConfirmationWait {
        self.pending.retain(|p| {
            !p.tx.is_closed() && !(p.kind == kind && p.name == name && p.role == role)
        });
        let (tx, rx) = oneshot::channel();
        self.pending.push(Pending {
            kind,
            name: name.clone(),
            role,
            tx,
        });
        ConfirmationWait {
            kind,
            name,
            role,
            budget,
            rx,
        }
    }

    /// Resolve the matching wait. Returns `false` when nothing was waiting
    /// for this confirmation, including when it was already delivered.
    pub fn deliver(&mut self, confirm: &DisconnectConfirm) -> bool {
        let Some(index) = self.pending.iter().position(|p| {
            p.kind == confirm.kind && p.name == confirm.name && p.role == confirm.role
        }) else {
            return false;
        };
        self.pending.swap_remove(index).tx.send(()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The waiting half of one handshake.
#[derive(Debug)]
pub struct ConfirmationWait {
    kind: DisconnectKind,
    name: String,
    role: Role,
    budget: Duration,
    rx: oneshot::Receiver<()>,
}

/// How a handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub kind: DisconnectKind,
    pub name: String,
    pub role: Role,
    pub confirmed: bool,
}

impl ConfirmationWait {
    /// Resolves on confirmation, or unconfirmed once the budget runs out.
    pub async fn settled(self) -> Settled {
        let confirmed = matches!(tokio::time::timeout(self.budget, self.rx).await, Ok(Ok(())));
        Settled {
            kind: self.kind,
            name: self.name,
            role: self.role,
            confirmed,
        }
    }
}

// ── Notices & reconnection ───────────────────────────────────────

impl Session {
    /// Tell the peer of `gone` that it went away. The peer is skipped when
    /// it is invalid, has no connection or is itself marked down. Returns
    /// the identity whose confirmation to expect.
    pub fn send_notice(
        &self,
        kind: DisconnectKind,
        gone: Role,
    ) -> Result<Option<(String, Role)>, HandleError> {
        let peer = self.slot(gone.peer());
        if !peer.valid || peer.departed || peer.outbound.is_none() || self.state().is_down(peer.role)
        {
            debug!(room = self.room, %gone, %kind, "no live peer to notify");
            return Ok(None);
        }
        peer.send(&Message::DisconnectNotice {
            kind,
            name: self.slot(gone).name.clone(),
            role: gone,
        })?;
        info!(room = self.room, %gone, %kind, peer = %peer.name, "disconnect notice sent");
        Ok(Some((peer.name.clone(), peer.role)))
    }

    /// Whether `name` may take back the `role` slot.
    pub fn can_resume(&self, name: &str, role: Role) -> bool {
        let slot = self.slot(role);
        self.running
            && self.kicked == 0
            && !slot.departed
            && slot.name == name
            && (!slot.valid || self.state().is_down(role))
    }

    /// Put a reconnected player back into their slot and send them the
    /// board. The peer, if live, hears `RECONNECT_OTHER_PLAYER`.
    pub fn resume(
        &mut self,
        name: &str,
        role: Role,
        sender: ConnectionSender,
        now: Instant,
    ) -> Result<ReconnectSnapshot, ResumeError> {
        if !self.can_resume(name, role) {
            return Err(ResumeError::NoMatch {
                name: name.to_string(),
                role,
            });
        }

        if !self.state().is_both_down() {
            self.paused = false;
        }
        self.progress.recover(role);

        let slot = self.slot_mut(role);
        slot.outbound = Some(sender);
        slot.valid = true;
        slot.last_seen = now;
        slot.heartbeats.clear();

        let snapshot = ReconnectSnapshot {
            round: self.round,
            rounds: *self.ledger.entries(),
            last_valid: self.progress.last_valid(),
            opponent: self.slot(role.peer()).name.clone(),
            secret: self.secret,
        };
        info!(room = self.room, %role, name, state = %self.state(), "player reconnected");

        self.send_to(role, &Message::ReconnectConfirm(Box::new(snapshot.clone())))?;
        if let Some(winner) = self.verdict {
            self.send_to(role, &Message::WinGame(winner))?;
        }
        let peer = self.slot(role.peer());
        if peer.valid && peer.outbound.is_some() {
            self.send_to(role.peer(), &Message::ReconnectOtherPlayer)?;
        }
        Ok(snapshot)
    }
}
