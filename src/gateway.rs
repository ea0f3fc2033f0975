// WebSocket gateway for the chat-bridge connection.
//
// The bridge process (Discord/IRC/whatever adapter) connects here and speaks
// the JSON protocol from `protocol.rs`. One bridge at a time: inbound text
// frames are forwarded to the app loop as events, and outbound messages are
// drained from the app loop's channel into the socket.

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::protocol::Outbound;

/// Events emitted by the gateway to the application layer.
#[derive(Debug, PartialEq)]
pub enum BridgeEvent {
    /// A bridge has connected.
    Connected { addr: String },
    /// The current bridge has disconnected.
    Disconnected,
    /// A text frame was received from the bridge (raw JSON string).
    Message(String),
}

/// Run the gateway on the given port.
///
/// Binds a TCP listener on `127.0.0.1:{port}` and accepts one connection at
/// a time. For each connection it performs the WebSocket handshake, then
/// serves the bridge until it disconnects. The listener runs forever (until
/// the task is cancelled or the process exits).
pub async fn run(
    port: u16,
    tx: mpsc::Sender<BridgeEvent>,
    mut out_rx: mpsc::Receiver<Outbound>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let local_addr = listener.local_addr()?;
    info!("Gateway listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {addr_str}: {e}");
                continue;
            }
        };

        if tx
            .send(BridgeEvent::Connected {
                addr: addr_str.clone(),
            })
            .await
            .is_err()
        {
            break;
        }

        let (write, read) = ws_stream.split();
        if serve_connection(read, write, &tx, &mut out_rx, &addr_str)
            .await
            .is_err()
        {
            break;
        }

        if tx.send(BridgeEvent::Disconnected).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Drive one bridge connection: forward inbound text frames through `tx` and
/// drain outbound messages from `out_rx` into the socket sink. Returns
/// `Err(())` if the event channel is closed (receiver dropped), signalling
/// the caller to stop.
pub async fn serve_connection<S>(
    mut read: SplitStream<WebSocketStream<S>>,
    mut write: SplitSink<WebSocketStream<S>, Message>,
    tx: &mpsc::Sender<BridgeEvent>,
    out_rx: &mut mpsc::Receiver<Outbound>,
    addr: &str,
) -> Result<(), ()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(BridgeEvent::Message(text.to_string())).await.is_err() {
                            return Err(());
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Bridge {addr} sent close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {addr}: {e}");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore Binary, Ping, Pong, Frame variants.
                    }
                    None => break,
                }
            }
            out = out_rx.recv() => {
                match out {
                    Some(msg) => send_outbound(&mut write, &msg, addr).await,
                    // App loop gone; nothing left to deliver.
                    None => break,
                }
            }
        }
    }
    Ok(())
}

/// Serialize and send one outbound message. Send failures are logged and
/// swallowed: a dead socket surfaces as a read error on the next select
/// round, and session state must never depend on delivery.
async fn send_outbound<S>(
    write: &mut SplitSink<WebSocketStream<S>, Message>,
    msg: &Outbound,
    addr: &str,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => {
            if let Err(e) = write.send(Message::Text(json.into())).await {
                warn!("Failed to send to bridge {addr}: {e}");
            }
        }
        Err(e) => warn!("Failed to serialize outbound message: {e}"),
    }
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], forwarding
/// text payloads through `tx`. This is a pure-logic function that requires
/// no I/O and is the primary unit-test target.
pub async fn process_frame_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<BridgeEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if tx.send(BridgeEvent::Message(text.to_string())).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Bridge {addr} sent close frame");
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
