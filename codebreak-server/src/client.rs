//! The pre-game conversation with one client.
//!
//! ```text
//! Foreign --START_LOGIN--> Login --REQUEST_ROOMS--> Lobby --JOIN_ROOM--> seated
//!    |                       ^                        |
//!    +--RECONNECT_REQUEST    +--------JOIN_FAIL-------+
//!       (back in a session, or RECONNECT_FAIL and stay Foreign)
//! ```
//!
//! Anything else closes the connection. Stray `PONG`s, which clients
//! coming back from a session may still have in flight, are skipped.

use std::sync::Arc;

use codebreak_core::{Connection, Message, Player, Role};
use tracing::{debug, info, warn};

use crate::rooms::Rooms;

/// Where a client is in the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Fresh connection: expects a login or a reconnect request.
    Foreign,
    /// Logged in, or back from a finished game: expects a room list request.
    Login { name: String, role: Role },
    /// Has the room list: expects a join.
    Lobby { name: String, role: Role },
}

/// How a handshake ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Waiting in a room for an opponent.
    Seated(u32),
    /// Handed back to the session it dropped out of.
    Resumed(u32),
    /// The client went away.
    Closed,
    /// The client broke the handshake and was disconnected.
    Rejected,
}

/// Drive one client from `stage` until it is seated, resumed or gone.
pub async fn greet(mut connection: Connection, mut stage: Stage, rooms: Arc<Rooms>) -> Exit {
    loop {
        let Some(payload) = connection.recv().await else {
            debug!(?stage, "client closed during handshake");
            return Exit::Closed;
        };
        let message = match Message::parse(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(?stage, error = %e, %payload, "malformed handshake message");
                return Exit::Rejected;
            }
        };

        let (next, reply) = match (stage, message) {
            (stage, Message::Pong { .. }) => (stage, None),

            (Stage::Foreign, Message::Login { name, role }) => {
                info!(%name, %role, "login");
                let reply = Message::LoginSuccess {
                    name: name.clone(),
                    role,
                };
                (Stage::Login { name, role }, Some(reply))
            }

            (Stage::Foreign, Message::ReconnectRequest { name, role }) => {
                match rooms.reconnect(name.clone(), role, connection).await {
                    Ok(room) => return Exit::Resumed(room),
                    Err(back) => {
                        info!(%name, %role, "reconnect refused");
                        connection = back;
                        (Stage::Foreign, Some(Message::ReconnectFail))
                    }
                }
            }

            (Stage::Login { name, role }, Message::RequestRooms { .. }) => {
                let reply = Message::RoomList(rooms.ids());
                (Stage::Lobby { name, role }, Some(reply))
            }

            (Stage::Lobby { name, role }, Message::JoinRoom { room, .. }) => {
                let player = Player {
                    name,
                    role,
                    connection,
                };
                match rooms.join(room, player) {
                    Ok(()) => return Exit::Seated(room),
                    Err(player) => {
                        connection = player.connection;
                        let stage = Stage::Login {
                            name: player.name,
                            role: player.role,
                        };
                        (stage, Some(Message::JoinFail))
                    }
                }
            }

            (stage, other) => {
                warn!(?stage, kind = %other.kind(), "unexpected handshake message");
                return Exit::Rejected;
            }
        };
        stage = next;

        if let Some(reply) = reply {
            if connection.send(&reply).await.is_err() {
                return Exit::Closed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebreak_core::{NoLobby, SessionTiming};
    use std::time::Duration;
    use tokio_test::assert_ok;
    use tokio_util::sync::CancellationToken;

    fn rooms() -> Arc<Rooms> {
        Rooms::new(
            2,
            SessionTiming::default(),
            Duration::from_secs(1),
            Arc::new(NoLobby),
            CancellationToken::new(),
        )
    }

    /// Start a handshake at `stage`; returns the client side and the task.
    fn open(stage: Stage, rooms: Arc<Rooms>) -> (Connection, tokio::task::JoinHandle<Exit>) {
        let (server, client) = tokio::io::duplex(1024);
        let task = tokio::spawn(greet(Connection::new(server), stage, rooms));
        (Connection::new(client), task)
    }

    async fn exchange(client: &mut Connection, payload: &str) -> Option<String> {
        assert_ok!(client.sender().send(payload.to_string()).await);
        client.recv().await
    }

    #[tokio::test]
    async fn login_list_and_join() {
        let rooms = rooms();
        let (mut client, task) = open(Stage::Foreign, rooms.clone());

        assert_eq!(
            exchange(&mut client, "LK:START_LOGIN:anna:0").await.as_deref(),
            Some("LK:LOGIN_SUCCESS:anna:0")
        );
        assert_eq!(
            exchange(&mut client, "LK:REQUEST_ROOMS:anna:0").await.as_deref(),
            Some("LK:ROOM_LIST:1:2")
        );
        // No room 5: back to Login, which wants the list again.
        assert_eq!(
            exchange(&mut client, "LK:JOIN_ROOM:anna:0:5").await.as_deref(),
            Some("LK:JOIN_FAIL")
        );
        assert_eq!(
            exchange(&mut client, "LK:REQUEST_ROOMS:anna:0").await.as_deref(),
            Some("LK:ROOM_LIST:1:2")
        );
        assert_eq!(
            exchange(&mut client, "LK:JOIN_ROOM:anna:0:2").await.as_deref(),
            Some("LK:JOIN_SUCCESS")
        );
        assert_eq!(assert_ok!(task.await), Exit::Seated(2));
    }

    #[tokio::test]
    async fn unmatched_reconnect_stays_foreign() {
        let (mut client, task) = open(Stage::Foreign, rooms());
        assert_eq!(
            exchange(&mut client, "LK:RECONNECT_REQUEST:anna:0").await.as_deref(),
            Some("LK:RECONNECT_FAIL")
        );
        assert_eq!(
            exchange(&mut client, "LK:START_LOGIN:anna:0").await.as_deref(),
            Some("LK:LOGIN_SUCCESS:anna:0")
        );
        drop(client);
        assert_eq!(assert_ok!(task.await), Exit::Closed);
    }

    #[tokio::test]
    async fn returning_player_skips_pongs_and_is_cut_off_on_anything_else() {
        let stage = Stage::Login {
            name: "bob".into(),
            role: Role::Evaluator,
        };
        let (mut client, task) = open(stage, rooms());
        let tx = client.sender();
        assert_ok!(tx.send("LK:PONG:bob:1".to_string()).await);
        assert_ok!(tx.send("LK:WIN_GAME_ACK".to_string()).await);

        assert_eq!(assert_ok!(task.await), Exit::Rejected);
        assert_eq!(client.recv().await, None);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (client, task) = open(Stage::Foreign, rooms());
        assert_ok!(client.sender().send("hello".to_string()).await);
        assert_eq!(assert_ok!(task.await), Exit::Rejected);
    }
}
