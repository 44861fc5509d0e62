//! Per-connection WebSocket handling

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response as HttpResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mc_protocol::{ErrorCode, ErrorObject, RequestId, Response};

use super::ServerContext;
use crate::connection::{ConnectionHandle, Outbound};
use crate::dispatch::{handle_disconnect, handle_message, Flow};

/// How long a closing connection may take to flush its queued replies
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) async fn upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ServerContext>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
) -> HttpResponse {
    let max_message_size = ctx.state.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, ctx, peer_addr))
}

async fn handle_socket(socket: WebSocket, ctx: ServerContext, peer_addr: SocketAddr) {
    let state = ctx.state;
    let (sink, mut stream) = socket.split();
    let (conn, outbound) = ConnectionHandle::channel(state.next_connection_id());

    tracing::info!(connection = %conn.id(), peer = %peer_addr, "Client connected");

    let writer = tokio::spawn(write_loop(sink, outbound, conn.closed_token()));

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                conn.request_close();
                break;
            }

            frame = stream.next() => {
                let Some(frame) = frame else {
                    break;
                };

                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            conn.deliver(Response::error(
                                RequestId::null(),
                                ErrorObject::new(ErrorCode::ParseError, "Binary frame is not valid UTF-8"),
                            ));
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    // Ping/pong are answered by the WebSocket layer
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(connection = %conn.id(), error = %e, "WebSocket read error");
                        break;
                    }
                };

                if handle_message(&state, &conn, &text).await == Flow::Close {
                    conn.request_close();
                    break;
                }
            }
        }
    }

    handle_disconnect(&state, &conn).await;
    let connection_id = conn.id();
    drop(conn);

    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, writer).await.is_err() {
        tracing::warn!(connection = %connection_id, "Timed out flushing replies to closing connection");
    }

    tracing::info!(connection = %connection_id, "Client disconnected");
}

/// Owns the socket's sending half; writes queued frames in order
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = outbound.recv() => frame,
            _ = closed.cancelled() => outbound.try_recv().ok(),
        };

        match frame {
            Some(Outbound::Reply(reply)) => {
                let text = match reply.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode reply");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Some(Outbound::Close) => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            None => break,
        }
    }

    let _ = sink.close().await;
}
