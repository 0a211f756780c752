//! WebSocket hub: one receive loop per connection, decoding remote-call
//! envelopes into typed commands and dispatching them against the room
//! registry. Failures become typed replies to the originating connection
//! only; they never touch other connections or a room's broadcast group.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use glyphmatch_core::card::SymbolId;
use glyphmatch_core::net::messages::{
    AnswerVerdict, ClientCommand, ErrorKind, ServerReply, Signal,
};
use glyphmatch_core::net::protocol::{decode_invoke, encode_reply};
use glyphmatch_core::player::{Player, PlayerData};
use glyphmatch_core::rules::GameRules;

use crate::progress::MatchOutcome;
use crate::room::{ContinueOutcome, RulesUpdate, StartOutcome};
use crate::room_manager::{CreateRoomError, Departure, RoomJoin};
use crate::state::AppState;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max = state.config.limits.max_ws_connections;
    let current = state.connections.len();
    if current >= max {
        tracing::warn!(current, max, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<String>(state.config.limits.connection_message_buffer);
    state.connections.add(connection_id, tx);
    tracing::info!(%connection_id, "Connection opened");

    let (ws_sender, mut ws_receiver) = socket.split();
    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, connection_id).await;

    cleanup(&state, connection_id).await;
}

fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<String>) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    connection_id: Uuid,
) {
    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if text.len() > state.config.limits.max_frame_bytes {
            tracing::warn!(%connection_id, bytes = text.len(), "Dropping oversized frame");
            continue;
        }

        let command = match decode_invoke(text.as_str()) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "Undecodable frame");
                reply(
                    state,
                    connection_id,
                    &ServerReply::Error {
                        error: ErrorKind::InvalidData,
                    },
                );
                continue;
            },
        };

        tracing::debug!(%connection_id, command = command.name(), "Dispatching");
        dispatch(state, connection_id, command).await;
    }
}

async fn dispatch(state: &AppState, connection_id: Uuid, command: ClientCommand) {
    match command {
        ClientCommand::CreateRoom {
            host,
            rules,
            room_id,
        } => create_room(state, connection_id, host, rules, room_id).await,
        ClientCommand::JoinRoom { player, room_id } => {
            join_room(state, connection_id, player, room_id).await
        },
        ClientCommand::UpdatePlayerData { player, room_id } => {
            update_player(state, connection_id, player, &room_id)
        },
        ClientCommand::UpdateGameRules { rules, room_id } => {
            update_rules(state, connection_id, rules, &room_id)
        },
        ClientCommand::CheckResult {
            symbol,
            room_id,
            player_id,
        } => check_result(state, connection_id, symbol, &room_id, &player_id).await,
        ClientCommand::ContinueRound { room_id } => {
            advance_round(state, connection_id, &room_id).await
        },
        ClientCommand::SendUpdateCommand { room_id } => {
            broadcast_signal(state, &room_id, Signal::Update)
        },
        ClientCommand::StartGame => start_game(state, connection_id),
        ClientCommand::EndGame => end_game(state, connection_id),
        ClientCommand::LeaveRoom => depart(state, connection_id).await,
    }
}

async fn create_room(
    state: &AppState,
    connection_id: Uuid,
    host: PlayerData,
    rules: GameRules,
    room_id: Option<String>,
) {
    if let Err(e) = host.validate() {
        tracing::debug!(%connection_id, error = %e, "Rejected host payload");
        reply_error(state, connection_id, ErrorKind::InvalidUserData);
        return;
    }
    if let Err(e) = rules.validate() {
        tracing::debug!(%connection_id, error = %e, "Rejected rules payload");
        reply_error(state, connection_id, ErrorKind::InvalidUserData);
        return;
    }

    match state
        .rooms
        .create_room(rules, Player::from_data(host), connection_id, room_id)
        .await
    {
        Ok(id) => {
            reply(
                state,
                connection_id,
                &ServerReply::RoomCode {
                    room_id: id.clone(),
                },
            );
            state
                .groups
                .add_to_group(&state.connections, connection_id, &id)
                .await;
        },
        Err(CreateRoomError::IdInUse) => {
            reply_error(state, connection_id, ErrorKind::RoomIdInUse);
        },
    }
}

async fn join_room(state: &AppState, connection_id: Uuid, player: PlayerData, room_id: String) {
    if let Err(e) = player.validate() {
        tracing::debug!(%connection_id, error = %e, "Rejected player payload");
        reply_error(state, connection_id, ErrorKind::InvalidUserData);
        return;
    }

    let join = state
        .rooms
        .join_room(Player::from_data(player), &room_id, connection_id)
        .await;
    let (room_id, notify) = match join {
        RoomJoin::Joined { room_id, notify } => (room_id, notify),
        RoomJoin::Created { room_id } => (room_id, true),
    };

    state
        .groups
        .add_to_group(&state.connections, connection_id, &room_id)
        .await;
    reply(
        state,
        connection_id,
        &ServerReply::RoomCode {
            room_id: room_id.clone(),
        },
    );
    if notify {
        broadcast_signal(state, &room_id, Signal::Update);
    }
}

fn update_player(state: &AppState, connection_id: Uuid, player: PlayerData, room_id: &str) {
    if let Err(e) = player.validate() {
        tracing::debug!(%connection_id, error = %e, "Rejected player payload");
        reply_error(state, connection_id, ErrorKind::InvalidUserData);
        return;
    }
    if state.rooms.update_player(player, room_id) {
        broadcast_signal(state, room_id, Signal::Update);
    } else {
        reply_error(state, connection_id, ErrorKind::NotFound);
    }
}

fn update_rules(state: &AppState, connection_id: Uuid, rules: GameRules, room_id: &str) {
    if let Err(e) = rules.validate() {
        tracing::debug!(%connection_id, error = %e, "Rejected rules payload");
        reply_error(state, connection_id, ErrorKind::InvalidUserData);
        return;
    }
    match state.rooms.update_rules(rules, room_id) {
        Some(RulesUpdate::Updated) => broadcast_signal(state, room_id, Signal::Update),
        Some(RulesUpdate::RejectedInProgress) => {
            tracing::debug!(%connection_id, room_id, "Rules update rejected mid-game");
        },
        None => reply_error(state, connection_id, ErrorKind::NotFound),
    }
}

async fn check_result(
    state: &AppState,
    connection_id: Uuid,
    symbol: SymbolId,
    room_id: &str,
    player_id: &str,
) {
    match state.rooms.check_result(symbol, room_id, player_id).await {
        None => reply_error(state, connection_id, ErrorKind::NotFound),
        Some(MatchOutcome::Won(_)) => {
            reply(
                state,
                connection_id,
                &ServerReply::Answer {
                    answer: AnswerVerdict::Valid,
                },
            );
            broadcast_signal(state, room_id, Signal::Suspend);
            advance_round(state, connection_id, room_id).await;
        },
        Some(MatchOutcome::Miss) => reply(
            state,
            connection_id,
            &ServerReply::Answer {
                answer: AnswerVerdict::Invalid,
            },
        ),
        Some(MatchOutcome::Late) => reply(
            state,
            connection_id,
            &ServerReply::Answer {
                answer: AnswerVerdict::Late,
            },
        ),
    }
}

/// Drain in-flight answer checks, draw the next master card, and tell the
/// room: `Score` while cards remain, `Update` once the deck is spent and
/// the room has moved to its summary.
async fn advance_round(state: &AppState, connection_id: Uuid, room_id: &str) {
    match state.rooms.continue_round(room_id).await {
        Some(ContinueOutcome::Continued) => broadcast_signal(state, room_id, Signal::Score),
        Some(ContinueOutcome::RoundsExhausted) => {
            tracing::info!(room_id, "Deck exhausted, room moved to summary");
            broadcast_signal(state, room_id, Signal::Update);
        },
        Some(ContinueOutcome::NotStarted) | None => {
            reply_error(state, connection_id, ErrorKind::NotFound);
        },
    }
}

fn start_game(state: &AppState, connection_id: Uuid) {
    match state.rooms.start_game(connection_id) {
        None => reply_error(state, connection_id, ErrorKind::NotFound),
        Some((room_id, StartOutcome::Started)) => {
            tracing::info!(%connection_id, room_id, "Game started");
            broadcast_signal(state, &room_id, Signal::Started);
        },
        Some((_, StartOutcome::NotHost)) => {
            reply_error(state, connection_id, ErrorKind::NotAHost);
        },
        Some((room_id, outcome)) => {
            tracing::debug!(%connection_id, room_id, ?outcome, "Game not started");
            reply_error(state, connection_id, ErrorKind::GameNotStarted);
        },
    }
}

fn end_game(state: &AppState, connection_id: Uuid) {
    match state.rooms.end_game(connection_id) {
        None => reply_error(state, connection_id, ErrorKind::NotFound),
        Some((room_id, true)) => {
            tracing::info!(%connection_id, room_id, "Game ended");
            broadcast_signal(state, &room_id, Signal::Update);
        },
        Some((_, false)) => reply_error(state, connection_id, ErrorKind::NotAHost),
    }
}

/// Leave whatever room the connection is in. Shared by the `LeaveRoom`
/// command and socket-close cleanup.
async fn depart(state: &AppState, connection_id: Uuid) {
    match state.rooms.disconnect(connection_id).await {
        Departure::Left { room_id } => {
            state
                .groups
                .remove_from_group(&state.connections, connection_id, &room_id)
                .await;
            broadcast_signal(state, &room_id, Signal::Update);
        },
        Departure::RoomRemoved { room_id } => {
            state
                .groups
                .remove_from_group(&state.connections, connection_id, &room_id)
                .await;
        },
        Departure::NotTracked => {},
    }
}

/// Close-time cleanup. Removing the connection from the registry is the
/// idempotency gate: only the first close signal finds it.
async fn cleanup(state: &AppState, connection_id: Uuid) {
    let Some(group_ids) = state.connections.remove(connection_id) else {
        return;
    };
    depart(state, connection_id).await;
    state.groups.sweep_connection(connection_id, group_ids).await;
    tracing::info!(%connection_id, "Connection closed");
}

fn reply(state: &AppState, connection_id: Uuid, reply: &ServerReply) {
    match encode_reply(reply) {
        Ok(frame) => state.connections.send_to(connection_id, frame),
        Err(e) => tracing::warn!(%connection_id, error = %e, "Failed to encode reply"),
    }
}

fn reply_error(state: &AppState, connection_id: Uuid, error: ErrorKind) {
    reply(state, connection_id, &ServerReply::Error { error });
}

fn broadcast_signal(state: &AppState, room_id: &str, signal: Signal) {
    state.groups.broadcast(room_id, signal.as_frame());
}
