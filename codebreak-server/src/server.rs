//! Accept loop and lobby.
//!
//! Every connection gets its own handshake task. Players a session is done
//! with come back through [`ReturnQueue`] and restart the handshake at
//! `Login` on the connection they already have.

use std::sync::Arc;
use std::time::Duration;

use codebreak_core::{CodebreakError, Connection, Lobby, Player, TaskPool};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Stage, greet};
use crate::config::ServerConfig;
use crate::rooms::Rooms;

/// Hands players back to the accept loop.
#[derive(Debug, Clone)]
pub struct ReturnQueue(mpsc::UnboundedSender<Player>);

impl Lobby for ReturnQueue {
    fn return_player(&self, player: Player) {
        if let Err(mpsc::error::SendError(player)) = self.0.send(player) {
            debug!(name = %player.name, "server stopping, player dropped");
        }
    }
}

/// The game server.
pub struct Server {
    config: ServerConfig,
    token: CancellationToken,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
        }
    }

    /// Cancel to stop the server.
    pub fn stop_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Bind the configured address and serve until stopped.
    pub async fn run(&self) -> Result<(), CodebreakError> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until stopped. Running sessions
    /// are shut down and joined before this returns.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), CodebreakError> {
        info!(
            addr = %listener.local_addr()?,
            rooms = self.config.rooms.count,
            "server listening"
        );

        let (returned_tx, mut returned) = mpsc::unbounded_channel();
        let rooms = Rooms::new(
            self.config.rooms.count,
            self.config.session_timing(),
            self.config.ready_timeout(),
            Arc::new(ReturnQueue(returned_tx)),
            self.token.child_token(),
        );
        let mut clients = TaskPool::with_token(self.token.child_token());
        let mut reaper = interval(Duration::from_secs(5));
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "client connected");
                        let rooms = Arc::clone(&rooms);
                        clients.spawn("client", async move {
                            let exit = greet(Connection::new(stream), Stage::Foreign, rooms).await;
                            debug!(%peer, ?exit, "handshake ended");
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(player) = returned.recv() => {
                    info!(name = %player.name, role = %player.role, "player back in the lobby");
                    let stage = Stage::Login {
                        name: player.name,
                        role: player.role,
                    };
                    let rooms = Arc::clone(&rooms);
                    clients.spawn("client", async move {
                        let exit = greet(player.connection, stage, rooms).await;
                        debug!(?exit, "handshake ended");
                    });
                }
                _ = reaper.tick() => clients.reap(),
            }
        }

        info!("shutting down");
        rooms.shutdown().await;
        clients.shutdown().await;
        info!("server stopped");
        Ok(())
    }
}
