//! Purpose: Decode ingestion response bodies into typed per-message outcomes.
//! Exports: `SuccessResult`, `FailureResponse`, `MessageStatus`, body parsers.
//! Role: Protocol layer between raw HTTP bodies and the publisher's decision table.
//! Invariants: Each decoded status is exactly one of success or failure; both or neither is rejected.
//! Invariants: Missing required fields surface as communication errors carrying the HTTP status.
#![allow(clippy::result_large_err)]

use super::error::Error;
use super::split::split_jsons;
use serde::Serialize;
use serde_json::{Map, Value};

pub(crate) const RESPONSE_NOT_PARSED: &str = "Response could not be parsed.";

/// Server acknowledgement of one message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResult {
    event_time: i64,
    key: String,
}

impl SuccessResult {
    pub fn new(event_time: i64, key: impl Into<String>) -> Self {
        Self {
            event_time,
            key: key.into(),
        }
    }

    /// Server-assigned registration time in epoch millis.
    pub fn event_time(&self) -> i64 {
        self.event_time
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    error_code: String,
    error_message: String,
}

impl FailureResponse {
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn to_error(&self) -> Error {
        Error::service(&self.error_code, &self.error_message)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageStatus {
    Success(SuccessResult),
    Failure(FailureResponse),
}

impl MessageStatus {
    pub fn success(&self) -> Option<&SuccessResult> {
        match self {
            MessageStatus::Success(result) => Some(result),
            MessageStatus::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureResponse> {
        match self {
            MessageStatus::Success(_) => None,
            MessageStatus::Failure(failure) => Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MessageStatus::Success(_))
    }

    /// Converts a failure entry into its typed service error.
    pub fn into_result(self) -> Result<SuccessResult, Error> {
        match self {
            MessageStatus::Success(result) => Ok(result),
            MessageStatus::Failure(failure) => Err(failure.to_error()),
        }
    }
}

#[derive(Serialize)]
struct WireStatus<'a> {
    success: Option<&'a SuccessResult>,
    failure: Option<&'a FailureResponse>,
}

/// Serializes in the server's wire shape: `{"success":{..}|null,"failure":{..}|null}`.
impl Serialize for MessageStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireStatus {
            success: self.success(),
            failure: self.failure(),
        }
        .serialize(serializer)
    }
}

/// Parses a 202 body of zero or more concatenated status objects.
pub(crate) fn parse_message_statuses(status: u16, body: &[u8]) -> Result<Vec<MessageStatus>, Error> {
    let text = body_text(status, body)?;
    split_jsons(text)
        .into_iter()
        .map(|fragment| {
            let object = decode_object(status, fragment)?;
            message_status_from_object(status, &object)
        })
        .collect()
}

/// Parses an error body holding exactly one failure object.
pub(crate) fn parse_failure_response(status: u16, body: &[u8]) -> Result<FailureResponse, Error> {
    let text = body_text(status, body)?;
    let object = decode_object(status, text)?;
    failure_from_object(status, &object)
}

fn body_text(status: u16, body: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(body)
        .map_err(|err| Error::communication(status, RESPONSE_NOT_PARSED).with_source(err))
}

fn decode_object(status: u16, fragment: &str) -> Result<Map<String, Value>, Error> {
    match serde_json::from_str::<Value>(fragment) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(Error::communication(status, RESPONSE_NOT_PARSED)),
        Err(err) => Err(Error::communication(status, RESPONSE_NOT_PARSED).with_source(err)),
    }
}

fn message_status_from_object(
    status: u16,
    object: &Map<String, Value>,
) -> Result<MessageStatus, Error> {
    match (present(object, "success"), present(object, "failure")) {
        (Some(success), None) => {
            let success = nested_object(status, success, "success")?;
            Ok(MessageStatus::Success(success_from_object(status, success)?))
        }
        (None, Some(failure)) => {
            let failure = nested_object(status, failure, "failure")?;
            Ok(MessageStatus::Failure(failure_from_object(status, failure)?))
        }
        (None, None) => Err(Error::communication(
            status,
            "Property [success] or [failure] is required",
        )),
        (Some(_), Some(_)) => Err(Error::communication(
            status,
            "Only one of properties [success] and [failure] is allowed",
        )),
    }
}

fn success_from_object(status: u16, object: &Map<String, Value>) -> Result<SuccessResult, Error> {
    let event_time = require(status, object, "eventTime")?
        .as_i64()
        .ok_or_else(|| Error::communication(status, "Property [eventTime] must be an integer"))?;
    let key = require_str(status, object, "key")?;
    Ok(SuccessResult::new(event_time, key))
}

fn failure_from_object(status: u16, object: &Map<String, Value>) -> Result<FailureResponse, Error> {
    let error_code = require_str(status, object, "errorCode")?;
    let error_message = require_str(status, object, "errorMessage")?;
    Ok(FailureResponse::new(error_code, error_message))
}

fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|value| !value.is_null())
}

fn require<'a>(status: u16, object: &'a Map<String, Value>, name: &str) -> Result<&'a Value, Error> {
    present(object, name)
        .ok_or_else(|| Error::communication(status, format!("Property [{name}] is required")))
}

fn require_str<'a>(status: u16, object: &'a Map<String, Value>, name: &str) -> Result<&'a str, Error> {
    require(status, object, name)?
        .as_str()
        .ok_or_else(|| Error::communication(status, format!("Property [{name}] must be a string")))
}

fn nested_object<'a>(
    status: u16,
    value: &'a Value,
    name: &str,
) -> Result<&'a Map<String, Value>, Error> {
    value
        .as_object()
        .ok_or_else(|| Error::communication(status, format!("Property [{name}] must be an object")))
}
