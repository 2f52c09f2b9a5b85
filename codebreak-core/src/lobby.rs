//! The boundary between a running session and whatever seats players.

use crate::message::Role;
use crate::network::Connection;

/// A player leaving a session, with the live connection they came in on.
///
/// The connection carries its receiver too: anything the client sent after
/// its last handled message is still queued for the lobby to read.
#[derive(Debug)]
pub struct Player {
    pub name: String,
    pub role: Role,
    pub connection: Connection,
}

/// Where sessions send players whose game is over.
pub trait Lobby: Send + Sync + 'static {
    fn return_player(&self, player: Player);
}

/// Discards returned players, closing their connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLobby;

impl Lobby for NoLobby {
    fn return_player(&self, player: Player) {
        tracing::debug!(name = %player.name, role = %player.role, "player dropped, no lobby");
    }
}
