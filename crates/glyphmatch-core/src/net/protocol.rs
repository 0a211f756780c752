use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::net::messages::{ClientCommand, ServerReply};
use crate::player::PlayerData;
use crate::rules::GameRules;

/// `message` value of a remote-call envelope.
pub const INVOKE_MESSAGE: &str = "invoke";
/// `message` value of a direct reply envelope.
pub const RESPONSE_MESSAGE: &str = "WebSocketResponse";

/// Default cap on inbound frame size in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    Malformed(String),
    NotAnInvoke(String),
    MissingCommand,
    UnknownCommand(String),
    BadArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    BadArgument {
        command: &'static str,
        index: usize,
        reason: String,
    },
    Serialize(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed envelope: {e}"),
            Self::NotAnInvoke(m) => write!(f, "unexpected message kind: {m:?}"),
            Self::MissingCommand => write!(f, "invoke without a command name"),
            Self::UnknownCommand(name) => write!(f, "unknown command: {name:?}"),
            Self::BadArity {
                command,
                expected,
                got,
            } => write!(f, "{command} expects {expected} args, got {got}"),
            Self::BadArgument {
                command,
                index,
                reason,
            } => write!(f, "{command} arg {index}: {reason}"),
            Self::Serialize(e) => write!(f, "serialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(serde::Deserialize)]
struct Envelope {
    message: String,
    #[serde(default)]
    args: Vec<Value>,
}

/// Decode an inbound text frame into a typed command. The envelope is
/// `{"message":"invoke","args":[name, ...positional]}`; player and rules
/// payloads are accepted either JSON-encoded as strings (what the browser
/// sends) or as inline objects.
pub fn decode_invoke(text: &str) -> Result<ClientCommand, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if envelope.message != INVOKE_MESSAGE {
        return Err(ProtocolError::NotAnInvoke(envelope.message));
    }

    let mut args = envelope.args;
    if args.is_empty() {
        return Err(ProtocolError::MissingCommand);
    }
    let name = match args.remove(0) {
        Value::String(s) => s,
        _ => return Err(ProtocolError::MissingCommand),
    };

    match name.as_str() {
        "CreateRoom" => {
            expect_arity("CreateRoom", &args, 2, 3)?;
            Ok(ClientCommand::CreateRoom {
                host: payload_arg::<PlayerData>("CreateRoom", &args, 0)?,
                rules: payload_arg::<GameRules>("CreateRoom", &args, 1)?,
                room_id: opt_string_arg("CreateRoom", &args, 2)?,
            })
        },
        "JoinRoom" => {
            expect_arity("JoinRoom", &args, 2, 2)?;
            Ok(ClientCommand::JoinRoom {
                player: payload_arg::<PlayerData>("JoinRoom", &args, 0)?,
                room_id: string_arg("JoinRoom", &args, 1)?,
            })
        },
        "UpdatePlayerData" => {
            expect_arity("UpdatePlayerData", &args, 2, 2)?;
            Ok(ClientCommand::UpdatePlayerData {
                player: payload_arg::<PlayerData>("UpdatePlayerData", &args, 0)?,
                room_id: string_arg("UpdatePlayerData", &args, 1)?,
            })
        },
        "UpdateGameRules" => {
            expect_arity("UpdateGameRules", &args, 2, 2)?;
            Ok(ClientCommand::UpdateGameRules {
                rules: payload_arg::<GameRules>("UpdateGameRules", &args, 0)?,
                room_id: string_arg("UpdateGameRules", &args, 1)?,
            })
        },
        "CheckResult" => {
            expect_arity("CheckResult", &args, 3, 3)?;
            Ok(ClientCommand::CheckResult {
                symbol: symbol_arg("CheckResult", &args, 0)?,
                room_id: string_arg("CheckResult", &args, 1)?,
                player_id: string_arg("CheckResult", &args, 2)?,
            })
        },
        "ContinueRound" => {
            expect_arity("ContinueRound", &args, 1, 1)?;
            Ok(ClientCommand::ContinueRound {
                room_id: string_arg("ContinueRound", &args, 0)?,
            })
        },
        "SendUpdateCommand" => {
            expect_arity("SendUpdateCommand", &args, 1, 1)?;
            Ok(ClientCommand::SendUpdateCommand {
                room_id: string_arg("SendUpdateCommand", &args, 0)?,
            })
        },
        "StartGame" => {
            expect_arity("StartGame", &args, 0, 0)?;
            Ok(ClientCommand::StartGame)
        },
        "EndGame" => {
            expect_arity("EndGame", &args, 0, 0)?;
            Ok(ClientCommand::EndGame)
        },
        "LeaveRoom" => {
            expect_arity("LeaveRoom", &args, 0, 0)?;
            Ok(ClientCommand::LeaveRoom)
        },
        _ => Err(ProtocolError::UnknownCommand(name)),
    }
}

/// Encode a direct reply as a `WebSocketResponse` envelope.
pub fn encode_reply(reply: &ServerReply) -> Result<String, ProtocolError> {
    let payload =
        serde_json::to_value(reply).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    serde_json::to_string(&serde_json::json!({
        "message": RESPONSE_MESSAGE,
        "args": [payload],
    }))
    .map_err(|e| ProtocolError::Serialize(e.to_string()))
}

fn expect_arity(
    command: &'static str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), ProtocolError> {
    if args.len() < min || args.len() > max {
        return Err(ProtocolError::BadArity {
            command,
            expected: min,
            got: args.len(),
        });
    }
    Ok(())
}

fn string_arg(command: &'static str, args: &[Value], index: usize) -> Result<String, ProtocolError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(ProtocolError::BadArgument {
            command,
            index,
            reason: format!("expected string, got {other:?}"),
        }),
    }
}

/// A trailing optional string: absent or null both mean "not given".
fn opt_string_arg(
    command: &'static str,
    args: &[Value],
    index: usize,
) -> Result<Option<String>, ProtocolError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        other => Err(ProtocolError::BadArgument {
            command,
            index,
            reason: format!("expected string or null, got {other:?}"),
        }),
    }
}

fn symbol_arg(command: &'static str, args: &[Value], index: usize) -> Result<u32, ProtocolError> {
    match args.get(index) {
        Some(Value::Number(n)) => {
            n.as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(ProtocolError::BadArgument {
                    command,
                    index,
                    reason: format!("symbol id out of range: {n}"),
                })
        },
        other => Err(ProtocolError::BadArgument {
            command,
            index,
            reason: format!("expected number, got {other:?}"),
        }),
    }
}

fn payload_arg<T: DeserializeOwned>(
    command: &'static str,
    args: &[Value],
    index: usize,
) -> Result<T, ProtocolError> {
    let bad = |reason: String| ProtocolError::BadArgument {
        command,
        index,
        reason,
    };
    match args.get(index) {
        Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| bad(e.to_string())),
        Some(inline @ Value::Object(_)) => {
            serde_json::from_value(inline.clone()).map_err(|e| bad(e.to_string()))
        },
        other => Err(bad(format!("expected JSON payload, got {other:?}"))),
    }
}
