//! Rooms: seating, the start handshake and the sessions they run.
//!
//! Seats are filled by the client handshake. When a room's second seat
//! fills, both players are sent `GAME_START` and have a bounded time to
//! answer `READY_GAME_START`; then the room gets a session of its own and
//! reopens once that session ends.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use codebreak_core::{
    CodebreakError, Connection, Lobby, Message, Player, ProtocolError, Role, SessionLink,
    SessionReport, SessionTiming, spawn_session,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a room is doing, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Taking players; `seated` of the two seats are filled.
    Open { seated: usize },
    /// Waiting for both players to answer `GAME_START`.
    Starting,
    Running,
}

#[derive(Debug)]
enum Status {
    Open,
    Starting,
    Running(SessionLink),
}

#[derive(Debug)]
struct Room {
    id: u32,
    guesser: Option<Player>,
    evaluator: Option<Player>,
    status: Status,
}

impl Room {
    fn new(id: u32) -> Self {
        Self {
            id,
            guesser: None,
            evaluator: None,
            status: Status::Open,
        }
    }

    fn seat(&mut self, role: Role) -> &mut Option<Player> {
        match role {
            Role::Guesser => &mut self.guesser,
            Role::Evaluator => &mut self.evaluator,
        }
    }

    fn state(&self) -> RoomState {
        match self.status {
            Status::Open => RoomState::Open {
                seated: usize::from(self.guesser.is_some()) + usize::from(self.evaluator.is_some()),
            },
            Status::Starting => RoomState::Starting,
            Status::Running(_) => RoomState::Running,
        }
    }
}

/// Every room on the server.
pub struct Rooms {
    rooms: Mutex<Vec<Room>>,
    timing: SessionTiming,
    ready_timeout: Duration,
    lobby: Arc<dyn Lobby>,
    /// Parent of every session's token.
    token: CancellationToken,
    tasks: Mutex<JoinSet<()>>,
}

impl Rooms {
    /// Rooms `1..=count`. Sessions hand finished players to `lobby`.
    pub fn new(
        count: u32,
        timing: SessionTiming,
        ready_timeout: Duration,
        lobby: Arc<dyn Lobby>,
        token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new((1..=count).map(Room::new).collect()),
            timing,
            ready_timeout,
            lobby,
            token,
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(fut);
    }

    /// Room numbers, for `ROOM_LIST`.
    pub fn ids(&self) -> Vec<u32> {
        self.lock().iter().map(|room| room.id).collect()
    }

    pub fn state(&self, room: u32) -> Option<RoomState> {
        self.lock().iter().find(|r| r.id == room).map(Room::state)
    }

    /// Seat `player` in `room`. Fails, handing the player back, when the
    /// room does not exist, is not open, or already has someone in that
    /// role.
    pub fn join(self: &Arc<Self>, room: u32, player: Player) -> Result<(), Player> {
        let mut rooms = self.lock();
        let Some(entry) = rooms.iter_mut().find(|r| r.id == room) else {
            debug!(room, name = %player.name, "join: no such room");
            return Err(player);
        };
        if !matches!(entry.status, Status::Open) || entry.seat(player.role).is_some() {
            debug!(room, name = %player.name, role = %player.role, state = ?entry.state(), "join refused");
            return Err(player);
        }

        // Queued here so it cannot trail the start handshake's GAME_START.
        if player
            .connection
            .sender()
            .try_send(Message::JoinSuccess.encode())
            .is_err()
        {
            debug!(room, name = %player.name, "join: connection not writable");
            return Err(player);
        }
        info!(room, name = %player.name, role = %player.role, "player seated");
        let role = player.role;
        *entry.seat(role) = Some(player);

        if entry.guesser.is_some() && entry.evaluator.is_some() {
            if let (Some(guesser), Some(evaluator)) = (entry.guesser.take(), entry.evaluator.take())
            {
                entry.status = Status::Starting;
                drop(rooms);
                let this = Arc::clone(self);
                self.spawn(async move { this.start(room, guesser, evaluator).await });
            }
        }
        Ok(())
    }

    /// Offer a reconnecting player to every running session in turn.
    /// Returns the room that took them, or the connection back.
    pub async fn reconnect(
        &self,
        name: String,
        role: Role,
        mut connection: Connection,
    ) -> Result<u32, Connection> {
        let links: Vec<SessionLink> = self
            .lock()
            .iter()
            .filter_map(|room| match &room.status {
                Status::Running(link) => Some(link.clone()),
                _ => None,
            })
            .collect();

        for link in links {
            match link.reconnect(name.clone(), role, connection).await {
                Ok(()) => {
                    info!(room = link.room(), %name, %role, "reconnect routed");
                    return Ok(link.room());
                }
                Err(back) => connection = back,
            }
        }
        debug!(%name, %role, "reconnect matched no session");
        Err(connection)
    }

    /// Run the start handshake, then the session.
    async fn start(self: Arc<Self>, room: u32, guesser: Player, evaluator: Player) {
        info!(room, guesser = %guesser.name, evaluator = %evaluator.name, "starting game");
        let guesser_name = guesser.name.clone();
        let evaluator_name = evaluator.name.clone();

        let ready = async {
            tokio::join!(
                await_ready(guesser, evaluator_name.clone(), self.ready_timeout),
                await_ready(evaluator, guesser_name.clone(), self.ready_timeout),
            )
        };
        let (guesser, evaluator) = tokio::select! {
            _ = self.token.cancelled() => return,
            (g, e) = ready => (report_ready(&guesser_name, g), report_ready(&evaluator_name, e)),
        };

        let mut rooms = self.lock();
        let Some(entry) = rooms.iter_mut().find(|r| r.id == room) else {
            return;
        };
        if self.token.is_cancelled() {
            return;
        }
        match (guesser, evaluator) {
            (Some(guesser), Some(evaluator)) => {
                let handle = spawn_session(
                    room,
                    guesser,
                    evaluator,
                    self.timing,
                    Arc::clone(&self.lobby),
                    &self.token,
                );
                entry.status = Status::Running(handle.link());
                drop(rooms);

                let this = Arc::clone(&self);
                self.spawn(async move {
                    match handle.join().await {
                        Ok(report) => this.finish(report),
                        Err(e) => {
                            warn!(room, error = %e, "session task failed");
                            this.reopen(room);
                        }
                    }
                });
            }
            (guesser, evaluator) => {
                warn!(room, "start handshake failed, keeping whoever answered");
                entry.guesser = guesser;
                entry.evaluator = evaluator;
                entry.status = Status::Open;
            }
        }
    }

    fn finish(&self, report: SessionReport) {
        info!(
            room = report.room,
            end = ?report.end,
            rounds = report.rounds_played,
            winner = ?report.winner,
            "room free"
        );
        self.reopen(report.room);
    }

    fn reopen(&self, room: u32) {
        if let Some(entry) = self.lock().iter_mut().find(|r| r.id == room) {
            entry.status = Status::Open;
        }
    }

    /// Stop every session and start handshake, wait for them, and close
    /// the connections of players still seated.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "room task failed");
            }
        }
        for room in self.lock().iter_mut() {
            room.guesser = None;
            room.evaluator = None;
        }
        info!("rooms shut down");
    }
}

/// Send `GAME_START` and wait for this player's `READY_GAME_START`.
/// Any other answer, a closed connection or running out of `budget` is an
/// error; the player is dropped with it, closing their connection.
async fn await_ready(
    mut player: Player,
    opponent: String,
    budget: Duration,
) -> Result<Player, CodebreakError> {
    player.connection.send(&Message::GameStart { opponent }).await?;
    match tokio::time::timeout(budget, next_ready(&mut player)).await {
        Ok(Ok(())) => Ok(player),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(CodebreakError::Timeout(budget)),
    }
}

/// Read until `player`'s own `READY_GAME_START`, skipping heartbeats.
async fn next_ready(player: &mut Player) -> Result<(), CodebreakError> {
    loop {
        let payload = player
            .connection
            .recv()
            .await
            .ok_or(CodebreakError::ChannelClosed)?;
        match Message::parse(&payload)? {
            Message::Pong { .. } => continue,
            Message::ReadyStart { name, role } if name == player.name && role == player.role => {
                return Ok(());
            }
            Message::ReadyStart { name, role } => {
                return Err(ProtocolError::InvalidField {
                    kind: "READY_GAME_START",
                    field: "player",
                    value: format!("{name}:{role}"),
                }
                .into());
            }
            other => return Err(CodebreakError::UnexpectedMessage(other.kind())),
        }
    }
}

/// Log why a start handshake dropped `name`.
fn report_ready(name: &str, result: Result<Player, CodebreakError>) -> Option<Player> {
    match result {
        Ok(player) => Some(player),
        Err(CodebreakError::ChannelClosed) => {
            info!(%name, "left before the game started");
            None
        }
        Err(e) => {
            warn!(%name, error = %e, "no ready answer to game start");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebreak_core::{MessageKind, NoLobby};
    use tokio_test::{assert_err, assert_ok};

    fn rooms(count: u32) -> Arc<Rooms> {
        Rooms::new(
            count,
            SessionTiming::default(),
            Duration::from_secs(1),
            Arc::new(NoLobby),
            CancellationToken::new(),
        )
    }

    fn player(name: &str, role: Role) -> (Player, Connection) {
        let (server, client) = tokio::io::duplex(1024);
        let player = Player {
            name: name.to_string(),
            role,
            connection: Connection::new(server),
        };
        (player, Connection::new(client))
    }

    async fn wait_for(rooms: &Rooms, room: u32, want: RoomState) {
        for _ in 0..200 {
            if rooms.state(room) == Some(want) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never reached {want:?}");
    }

    #[tokio::test]
    async fn rooms_are_numbered_from_one() {
        assert_eq!(rooms(3).ids(), vec![1, 2, 3]);
        assert_eq!(rooms(0).ids(), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn taken_seat_and_unknown_room_are_refused() {
        let rooms = rooms(2);
        let (anna, _a) = player("anna", Role::Guesser);
        let (carl, _c) = player("carl", Role::Guesser);
        let (dora, _d) = player("dora", Role::Evaluator);

        assert!(rooms.join(1, anna).is_ok());
        assert_eq!(rooms.state(1), Some(RoomState::Open { seated: 1 }));

        let back = rooms.join(1, carl).unwrap_err();
        assert_eq!(back.name, "carl");
        assert_err!(rooms.join(9, dora));
        assert_eq!(rooms.state(9), None);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_player_fails_the_start_and_the_other_stays_seated() {
        let rooms = rooms(1);
        let (anna, mut anna_client) = player("anna", Role::Guesser);
        let (bob, mut bob_client) = player("bob", Role::Evaluator);

        rooms.join(1, anna).unwrap();
        rooms.join(1, bob).unwrap();
        assert_eq!(rooms.state(1), Some(RoomState::Starting));

        assert_eq!(anna_client.recv().await.as_deref(), Some("LK:JOIN_SUCCESS"));
        assert_eq!(anna_client.recv().await.as_deref(), Some("LK:GAME_START:bob"));
        assert_eq!(bob_client.recv().await.as_deref(), Some("LK:JOIN_SUCCESS"));
        assert_eq!(bob_client.recv().await.as_deref(), Some("LK:GAME_START:anna"));
        anna_client
            .send(&Message::ReadyStart {
                name: "anna".into(),
                role: Role::Guesser,
            })
            .await
            .unwrap();

        // Bob never answers and is cut off after the timeout.
        assert_eq!(bob_client.recv().await, None);
        wait_for(&rooms, 1, RoomState::Open { seated: 1 }).await;
    }

    #[tokio::test(start_paused = true)]
    async fn silent_player_runs_out_the_ready_budget() {
        let (anna, mut client) = player("anna", Role::Guesser);
        let budget = Duration::from_secs(10);
        let result = await_ready(anna, "bob".into(), budget).await;
        assert!(matches!(result, Err(CodebreakError::Timeout(d)) if d == budget));
        assert_eq!(client.recv().await.as_deref(), Some("LK:GAME_START:bob"));
        assert_eq!(client.recv().await, None);
    }

    #[tokio::test]
    async fn ready_answers_are_checked() {
        async fn answer(payloads: &[&str]) -> Result<Player, CodebreakError> {
            let (anna, client) = player("anna", Role::Guesser);
            for payload in payloads {
                assert_ok!(client.sender().send(payload.to_string()).await);
            }
            // Queued payloads still go out before the close.
            drop(client);
            await_ready(anna, "bob".into(), Duration::from_secs(10)).await
        }

        let ok = assert_ok!(answer(&["LK:PONG:anna:0", "LK:READY_GAME_START:anna:0"]).await);
        assert_eq!(ok.name, "anna");

        assert!(matches!(
            answer(&["LK:PING"]).await,
            Err(CodebreakError::UnexpectedMessage(MessageKind::Ping))
        ));
        assert!(matches!(
            answer(&["hello"]).await,
            Err(CodebreakError::Protocol(ProtocolError::MissingTag))
        ));
        assert!(matches!(
            answer(&["LK:READY_GAME_START:bob:1"]).await,
            Err(CodebreakError::Protocol(ProtocolError::InvalidField { .. }))
        ));
        assert!(matches!(answer(&[]).await, Err(CodebreakError::ChannelClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn both_ready_runs_a_session_and_reconnect_reaches_it() {
        let rooms = rooms(1);
        let (anna, mut anna_client) = player("anna", Role::Guesser);
        let (bob, mut bob_client) = player("bob", Role::Evaluator);
        rooms.join(1, anna).unwrap();
        rooms.join(1, bob).unwrap();

        for (client, name, role) in [
            (&mut anna_client, "anna", Role::Guesser),
            (&mut bob_client, "bob", Role::Evaluator),
        ] {
            assert_eq!(client.recv().await.as_deref(), Some("LK:JOIN_SUCCESS"));
            assert!(client.recv().await.unwrap().starts_with("LK:GAME_START:"));
            client
                .send(&Message::ReadyStart {
                    name: name.into(),
                    role,
                })
                .await
                .unwrap();
        }
        wait_for(&rooms, 1, RoomState::Running).await;

        // Nobody is down, so the session refuses.
        let (stranger, _s) = player("anna", Role::Guesser);
        assert_err!(
            rooms
                .reconnect("anna".into(), Role::Guesser, stranger.connection)
                .await
        );

        let (late, _l) = player("dora", Role::Evaluator);
        assert_err!(rooms.join(1, late));

        rooms.shutdown().await;
        assert_eq!(rooms.state(1), Some(RoomState::Open { seated: 0 }));
    }
}
