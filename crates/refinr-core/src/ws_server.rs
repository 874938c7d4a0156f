// WebSocket server for browser clients.

use std::fmt::Display;
use std::net::SocketAddr;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::protocol::ConnectionId;

/// Per-connection outbound queue. Unbounded: sends never wait on a slow
/// client, and a closed connection just makes `send` fail.
pub type Outbound = mpsc::UnboundedSender<String>;

/// Events emitted by the WebSocket server to the session layer.
///
/// All events of one connection travel through the same channel, so they
/// arrive in the order they happened on that connection.
#[derive(Debug)]
pub enum WsEvent {
    /// A client completed the handshake. `outbound` delivers text frames to it.
    Connected {
        conn_id: ConnectionId,
        addr: String,
        outbound: Outbound,
    },
    /// The client is gone (close frame, error or EOF).
    Disconnected { conn_id: ConnectionId },
    /// A text frame from the client (raw JSON string).
    Message { conn_id: ConnectionId, text: String },
}

/// A bound TCP listener ready to accept WebSocket clients.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Accept WebSocket clients forever, forwarding their events through `tx`.
///
/// Every accepted connection is served on its own task. The loop stops once
/// the receiving side of `tx` has been dropped.
pub async fn run(listener: WsListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = match listener.listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept TCP connection: {e}");
                continue;
            }
        };
        if tx.is_closed() {
            break;
        }
        tokio::spawn(handle_connection(stream, addr, tx.clone()));
    }

    Ok(())
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, tx: mpsc::Sender<WsEvent>) {
    let addr_str = addr.to_string();
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr_str}: {e}");
            return;
        }
    };

    let conn_id = ConnectionId::new();
    info!("Client {conn_id} connected from {addr_str}");

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    if tx
        .send(WsEvent::Connected {
            conn_id: conn_id.clone(),
            addr: addr_str.clone(),
            outbound,
        })
        .await
        .is_err()
    {
        return;
    }

    let (write, read) = ws_stream.split();
    tokio::spawn(forward_outbound(outbound_rx, write, conn_id.clone()));

    if process_message_stream(read, &tx, &conn_id, &addr_str)
        .await
        .is_err()
    {
        return;
    }

    info!("Client {conn_id} disconnected");
    let _ = tx.send(WsEvent::Disconnected { conn_id }).await;
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], forwarding
/// text payloads through `tx`. Returns `Err(())` if the channel is closed
/// (receiver dropped), signalling the caller to stop.
///
/// Generic over the stream so it can be tested without opening sockets.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<WsEvent>,
    conn_id: &ConnectionId,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = WsEvent::Message {
                    conn_id: conn_id.clone(),
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

/// Drain a connection's outbound queue into its socket sink.
///
/// Ends when every sender is dropped (the session layer forgot the
/// connection) or a write fails.
pub async fn forward_outbound<Si>(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sink: Si,
    conn_id: ConnectionId,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(text) = rx.recv().await {
        if let Err(e) = sink.send(Message::text(text)).await {
            debug!("Dropping outbound frames for {conn_id}: {e}");
            return;
        }
    }
    let _ = sink.close().await;
}
