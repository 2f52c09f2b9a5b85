//! End-to-end over real TCP: login, rooms, a full game, and back to the
//! room list on the same socket.

use std::time::Duration;

use codebreak_core::Connection;
use codebreak_server::{Server, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: std::net::SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

async fn start(rooms: u32) -> Running {
    let mut config = ServerConfig::default();
    config.rooms.count = rooms;
    let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
    let addr = assert_ok!(listener.local_addr());

    let server = Server::new(config);
    let stop = server.stop_handle();
    let task = tokio::spawn(async move {
        assert_ok!(server.serve(listener).await);
    });
    Running { addr, stop, task }
}

struct Client(Connection);

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self(Connection::new(assert_ok!(TcpStream::connect(addr).await)))
    }

    async fn send(&self, payload: &str) {
        assert_ok!(self.0.sender().send(payload.to_string()).await);
    }

    /// Next payload that is not a heartbeat.
    async fn next(&mut self) -> Option<String> {
        let fut = async {
            loop {
                match self.0.recv().await {
                    Some(p) if p == "LK:PING" => continue,
                    other => return other,
                }
            }
        };
        assert_ok!(tokio::time::timeout(Duration::from_secs(10), fut).await)
    }

    async fn expect(&mut self, want: &str) {
        assert_eq!(self.next().await.as_deref(), Some(want));
    }

    async fn seat(&mut self, name: &str, role: u8, room: u32) {
        self.send(&format!("LK:START_LOGIN:{name}:{role}")).await;
        self.expect(&format!("LK:LOGIN_SUCCESS:{name}:{role}")).await;
        self.send(&format!("LK:REQUEST_ROOMS:{name}:{role}")).await;
        self.expect("LK:ROOM_LIST:1:2").await;
        self.send(&format!("LK:JOIN_ROOM:{name}:{role}:{room}")).await;
        self.expect("LK:JOIN_SUCCESS").await;
    }
}

#[tokio::test]
async fn full_game_then_back_to_the_room_list() {
    let server = start(2).await;
    let mut anna = Client::connect(server.addr).await;
    let mut bob = Client::connect(server.addr).await;

    anna.seat("anna", 0, 1).await;
    bob.seat("bob", 1, 1).await;

    anna.expect("LK:GAME_START:bob").await;
    bob.expect("LK:GAME_START:anna").await;
    anna.send("LK:READY_GAME_START:anna:0").await;
    bob.send("LK:READY_GAME_START:bob:1").await;

    bob.send("LK:CHOOSING_COLORS:1234").await;
    anna.expect("LK:CHOOSING_COLORS_CONFIRM:").await;
    bob.expect("LK:CHOOSING_COLORS_CONFIRM:").await;

    anna.send("LK:GUESSING_COLORS:1234").await;
    anna.expect("LK:GUESSING_COLORS_ACK:1234").await;
    bob.expect("LK:GUESSING_COLORS_ACK:1234").await;

    bob.send("LK:EVALUATION:4:0").await;
    for client in [&mut anna, &mut bob] {
        client.expect("LK:EVALUATION_ACK:4:0").await;
        client.expect("LK:WIN_GAME:0").await;
    }

    anna.send("LK:WIN_GAME_ACK").await;
    bob.send("LK:WIN_GAME_ACK").await;

    // Same sockets, back at the room list.
    anna.send("LK:REQUEST_ROOMS:anna:0").await;
    anna.expect("LK:ROOM_LIST:1:2").await;
    bob.send("LK:REQUEST_ROOMS:bob:1").await;
    bob.expect("LK:ROOM_LIST:1:2").await;

    server.stop.cancel();
    assert_ok!(server.task.await);
}

#[tokio::test]
async fn occupied_seat_is_refused_and_reconnect_without_a_game_fails() {
    let server = start(2).await;
    let mut anna = Client::connect(server.addr).await;
    anna.seat("anna", 0, 2).await;

    let mut carl = Client::connect(server.addr).await;
    carl.send("LK:RECONNECT_REQUEST:carl:0").await;
    carl.expect("LK:RECONNECT_FAIL").await;
    carl.send("LK:START_LOGIN:carl:0").await;
    carl.expect("LK:LOGIN_SUCCESS:carl:0").await;
    carl.send("LK:REQUEST_ROOMS:carl:0").await;
    carl.expect("LK:ROOM_LIST:1:2").await;
    carl.send("LK:JOIN_ROOM:carl:0:2").await;
    carl.expect("LK:JOIN_FAIL").await;

    server.stop.cancel();
    assert_ok!(server.task.await);
}

#[tokio::test]
async fn out_of_order_message_closes_the_socket() {
    let server = start(1).await;
    let mut eve = Client::connect(server.addr).await;
    eve.send("LK:GUESSING_COLORS:1234").await;
    assert_eq!(eve.next().await, None);

    server.stop.cancel();
    assert_ok!(server.task.await);
}
