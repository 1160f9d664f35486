//! JSON encoding of API requests and decoding of API responses.
//!
//! Commands are sent as one object keyed by correlation token:
//!
//! ```json
//! { "1.read.R0": { "read": "R0" }, "2.explore.R0": { "explore": "R0" } }
//! ```
//!
//! and the response echoes the same keys with one result object each:
//! `{"connections": [..]}`, `{"writing": "..", "order": n}` or `{"error": ".."}`.

use delve_core::{Command, CommandKind, DelveError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::client::{CommandOutcome, CommandResult};

#[derive(Debug, Deserialize)]
struct StartBody {
    #[serde(rename = "roomId")]
    room_id: String,
    drones: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReportReply {
    response: String,
}

/// Decode the body of a successful `start` call into `(room_id, drone_ids)`.
pub fn decode_start(body: &Value) -> Result<(String, Vec<String>)> {
    let start = StartBody::deserialize(body)
        .map_err(|e| DelveError::Decode(format!("start response: {e}")))?;
    Ok((start.room_id, start.drones))
}

/// Encode a batch of indexed commands.
pub fn encode_commands(commands: &[Command]) -> Value {
    let mut body = Map::with_capacity(commands.len());
    for command in commands {
        let mut value = Map::with_capacity(1);
        value.insert(
            command.kind().as_str().to_string(),
            Value::String(command.room_id().to_string()),
        );
        body.insert(command.token(), Value::Object(value));
    }
    Value::Object(body)
}

/// Decode a commands response into outcomes sorted by command index.
///
/// Keys that are not valid correlation tokens are skipped with a warning. A
/// result object with the wrong shape for its command kind fails the whole
/// response.
pub fn decode_commands(body: &Value) -> Result<Vec<CommandOutcome>> {
    let object = body
        .as_object()
        .ok_or_else(|| DelveError::Decode("commands response is not an object".into()))?;

    let mut outcomes = Vec::with_capacity(object.len());
    for (token, value) in object {
        let command = match Command::from_token(token) {
            Ok(command) => command,
            Err(e) => {
                warn!(token = %token, error = %e, "skipping uncorrelated command result");
                continue;
            }
        };
        let result = decode_result(&command, value)?;
        outcomes.push(CommandOutcome { command, result });
    }
    outcomes.sort_by_key(|o| o.command.index());
    Ok(outcomes)
}

fn decode_result(command: &Command, value: &Value) -> Result<CommandResult> {
    let bad = |what: &str| DelveError::Decode(format!("{}: {}", command.token(), what));

    if let Some(error) = value.get("error") {
        let message = error.as_str().ok_or_else(|| bad("error is not a string"))?;
        return Ok(CommandResult::Error {
            message: message.to_string(),
        });
    }

    match command.kind() {
        CommandKind::Explore => {
            let rooms = value
                .get("connections")
                .and_then(Value::as_array)
                .ok_or_else(|| bad("missing connections"))?
                .iter()
                .map(|room| {
                    room.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| bad("connection is not a string"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(CommandResult::Connections { rooms })
        }
        CommandKind::Read => {
            let text = value
                .get("writing")
                .and_then(Value::as_str)
                .ok_or_else(|| bad("missing writing"))?;
            let order = value
                .get("order")
                .and_then(Value::as_i64)
                .ok_or_else(|| bad("missing order"))?;
            Ok(CommandResult::Writing {
                text: text.to_string(),
                order,
            })
        }
    }
}

/// Encode the final report.
pub fn encode_report(message: &str) -> Value {
    serde_json::json!({ "message": message })
}

/// Decode the acknowledgement of a report.
pub fn decode_report(body: &Value) -> Result<String> {
    ReportReply::deserialize(body)
        .map(|reply| reply.response)
        .map_err(|e| DelveError::Decode(format!("report response: {e}")))
}

/// Pull the `error` field out of a failed response body, if there is one.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
