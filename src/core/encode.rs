//! Purpose: Turn messages into the ingestion wire JSON and back.
//! Exports: `JsonEncoder`, `DefaultJsonEncoder`, `payload_type_name`, `decode_message`, `payload_from_slice`.
//! Role: Local, non-retryable encoding boundary; runs before any network I/O.
//! Invariants: Field order is exactly `key, action, eventTime, properties, payload`.
//! Invariants: Publish payloads are wrapped as `{<TypeName>: payload}`; unpublish payload is `null`.
//! Invariants: The type name is derived once from a schema name ending in `IngestionMessage`.
#![allow(clippy::result_large_err)]

use super::error::{Error, ErrorKind};
use super::message::{Action, Message, Properties};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA_NAME_SUFFIX: &str = "IngestionMessage";

/// Pluggable message serializer used by a `Publisher`.
///
/// Implementations may adjust the message (for example enrich the payload) and then
/// delegate to [`DefaultJsonEncoder`]. The returned text is concatenated verbatim with
/// the other messages of a batch.
pub trait JsonEncoder: Send + Sync {
    fn encode(&self, message: &Message, payload_type_name: &str) -> Result<String, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultJsonEncoder;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage<'a> {
    key: &'a str,
    action: Action,
    event_time: Option<i64>,
    properties: &'a Properties,
    payload: Option<WrappedPayload<'a>>,
}

struct WrappedPayload<'a> {
    type_name: &'a str,
    payload: &'a Value,
}

impl Serialize for WrappedPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.type_name, self.payload)?;
        map.end()
    }
}

impl JsonEncoder for DefaultJsonEncoder {
    fn encode(&self, message: &Message, payload_type_name: &str) -> Result<String, Error> {
        if message.key().is_empty() {
            return Err(
                Error::new(ErrorKind::InvalidArgument).with_message("Message key must not be empty")
            );
        }
        let payload = match (message.action(), message.payload()) {
            (Action::Publish, Some(payload)) => Some(WrappedPayload {
                type_name: payload_type_name,
                payload,
            }),
            (Action::Publish, None) => {
                return Err(Error::new(ErrorKind::InvalidArgument)
                    .with_message("Publish message requires a payload"));
            }
            (Action::Unpublish, _) => None,
        };
        let wire = WireMessage {
            key: message.key(),
            action: message.action(),
            event_time: message.event_time(),
            properties: message.properties(),
            payload,
        };
        serde_json::to_string(&wire).map_err(|err| Error::encoding(&err).with_source(err))
    }
}

/// Strips the `IngestionMessage` suffix from a fully qualified channel schema name.
pub fn payload_type_name(channel_schema_name: &str) -> Result<String, Error> {
    match channel_schema_name.strip_suffix(SCHEMA_NAME_SUFFIX) {
        Some(type_name) if !type_name.is_empty() => Ok(type_name.to_string()),
        Some(_) => Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
            "Expected the provided channel schema name '{channel_schema_name}' to contain a type name before 'IngestionMessage'"
        ))),
        None => Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
            "Expected the provided channel schema name '{channel_schema_name}' to end with 'IngestionMessage'"
        ))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWireMessage {
    key: String,
    action: String,
    #[serde(default)]
    event_time: Option<i64>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    payload: Option<Value>,
}

fn invalid_message(detail: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidArgument).with_message(format!("Invalid ingestion message: {detail}"))
}

/// Parses one wire document produced by [`DefaultJsonEncoder`] back into a `Message`.
pub fn decode_message(json: &str, payload_type_name: &str) -> Result<Message, Error> {
    let raw: RawWireMessage =
        serde_json::from_str(json).map_err(|err| invalid_message(&err).with_source(err))?;
    let action = Action::parse(&raw.action)
        .ok_or_else(|| invalid_message(format!("unknown action '{}'", raw.action)))?;

    let mut properties = Properties::new();
    for (name, value) in raw.properties.unwrap_or_default() {
        match value {
            Value::String(value) => properties.insert(name, value),
            _ => {
                return Err(invalid_message(format!(
                    "property '{name}' must be a string"
                )));
            }
        }
    }

    let payload = match (action, raw.payload) {
        (Action::Publish, Some(Value::Object(mut wrapper))) if wrapper.len() == 1 => {
            match wrapper.remove(payload_type_name) {
                Some(payload) => Some(payload),
                None => {
                    return Err(invalid_message(format!(
                        "payload must be wrapped under '{payload_type_name}'"
                    )));
                }
            }
        }
        (Action::Publish, _) => {
            return Err(invalid_message(format!(
                "payload must be wrapped under '{payload_type_name}'"
            )));
        }
        (Action::Unpublish, None | Some(Value::Null)) => None,
        (Action::Unpublish, Some(_)) => {
            return Err(invalid_message("unpublish message must not carry a payload"));
        }
    };

    Ok(Message::from_parts(
        raw.key,
        action,
        raw.event_time,
        properties,
        payload,
    ))
}

/// Decodes caller-supplied bytes into a payload value, rejecting invalid UTF-8.
pub fn payload_from_slice(bytes: &[u8]) -> Result<Value, Error> {
    let text = std::str::from_utf8(bytes).map_err(|err| {
        Error::encoding("Malformed UTF-8 characters, possibly incorrectly encoded").with_source(err)
    })?;
    serde_json::from_str(text).map_err(|err| Error::encoding(&err).with_source(err))
}
