//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::session::{Command, ServerHandle, OUTBOUND_BUFFER};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    if state
        .server
        .send(Command::Connect {
            connection_id,
            outbound,
        })
        .await
        .is_err()
    {
        error!(connection_id = %connection_id, "Session loop unavailable");
        return;
    }

    let limiter = ConnectionRateLimiter::new(
        state.config.move_rate_limit,
        state.config.action_rate_limit,
    );
    let reason = run_session(
        connection_id,
        ws_sink,
        ws_stream,
        outbound_rx,
        &state.server,
        limiter,
    )
    .await;

    let _ = state
        .server
        .send(Command::Disconnect {
            connection_id,
            reason,
        })
        .await;

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Pump frames both ways until the socket closes. Returns the close reason.
async fn run_session(
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
    server: &ServerHandle,
    limiter: ConnectionRateLimiter,
) -> String {
    // Writer task: session loop -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session loop
    let mut reason = "disconnected".to_string();
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if !limiter.check(&msg) {
                            warn!(connection_id = %connection_id, "Rate limited input message");
                            continue;
                        }

                        let command = Command::Intent {
                            connection_id,
                            msg,
                            received_at: unix_millis(),
                        };
                        if server.send(command).await.is_err() {
                            debug!(connection_id = %connection_id, "Session loop closed");
                            reason = "server shutdown".to_string();
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                reason = "closed".to_string();
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                reason = "error".to_string();
                break;
            }
        }
    }

    writer_handle.abort();
    reason
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
