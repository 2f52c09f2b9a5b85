use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::error::CodebreakError;
use crate::message::Message;

/// Capacity of both the outbound and the inbound channel.
const CHANNEL_CAPACITY: usize = 100;

/// Cloneable handle feeding the background writer task.
pub type ConnectionSender = mpsc::Sender<String>;

/// Sole consumer of the background reader task's output.
pub type ConnectionReceiver = mpsc::Receiver<String>;

/// A framed connection to a single client.
///
/// The socket is owned by two background tasks: a writer draining the
/// outbound channel and a reader filling the inbound one. Once the writer
/// fails every send reports failure; once the reader fails `recv` yields
/// `None`. The socket closes when every sender and the receiver are gone.
#[derive(Debug)]
pub struct Connection {
    // Channel to send payloads to background writer task
    tx: ConnectionSender,
    // Channel to receive payloads from background reader task
    rx: ConnectionReceiver,
}

impl Connection {
    pub fn new<IO>(io: IO) -> Self
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(io, FrameCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Writer task: User -> Network
        tokio::spawn(async move {
            while let Some(payload) = network_rx.recv().await {
                if let Err(e) = net_writer.send(payload).await {
                    warn!(error = %e, "network write error");
                    break;
                }
            }
            // Half-close so the peer sees EOF.
            let _ = net_writer.close().await;
        });

        // Reader task: Network -> User
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // user_rx was dropped, stop reading
                    _ = network_tx.closed() => break,
                    frame = net_reader.next() => match frame {
                        Some(Ok(payload)) => {
                            if network_tx.send(payload).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "network read error");
                            break;
                        }
                        None => {
                            debug!("peer closed the connection");
                            break;
                        }
                    },
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    pub fn from_parts(tx: ConnectionSender, rx: ConnectionReceiver) -> Self {
        Self { tx, rx }
    }

    pub fn into_parts(self) -> (ConnectionSender, ConnectionReceiver) {
        (self.tx, self.rx)
    }

    pub async fn send(&self, message: &Message) -> Result<(), CodebreakError> {
        self.tx.send(message.encode()).await?;
        Ok(())
    }

    /// Next raw payload, or `None` once the reader has stopped.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }
}
