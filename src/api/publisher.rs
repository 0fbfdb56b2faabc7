//! Purpose: Send ingestion messages to one channel and interpret the per-message outcomes.
//! Exports: `Publisher`.
//! Role: Orchestrates encode -> POST -> status decision table for a single channel.
//! Invariants: One call issues exactly one HTTP request; nothing is retried or reordered.
//! Invariants: `send_multi` returns one status per input message, positionally aligned.
//! Invariants: Encoding failures surface before any network I/O.
#![allow(clippy::result_large_err)]

use super::client::Connection;
use super::transport::{HttpResponse, Method};
use crate::core::error::Error;
use crate::core::message::Message;
use crate::core::status::{
    MessageStatus, SuccessResult, parse_failure_response, parse_message_statuses,
};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

type ApiResult<T> = Result<T, Error>;

/// Channel-bound sender. Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    connection: Arc<Connection>,
    channel: String,
    channel_schema_name: String,
    payload_type_name: String,
    messages_uri: Url,
    schema_uri: Url,
}

impl Publisher {
    pub(crate) fn new(
        connection: Arc<Connection>,
        channel: String,
        channel_schema_name: String,
        payload_type_name: String,
    ) -> Self {
        let messages_uri = connection.channel_uri(&channel, "messages");
        let schema_uri = connection.channel_uri(&channel, "schema");
        Self {
            inner: Arc::new(PublisherInner {
                connection,
                channel,
                channel_schema_name,
                payload_type_name,
                messages_uri,
                schema_uri,
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn channel_schema_name(&self) -> &str {
        &self.inner.channel_schema_name
    }

    /// The key publish payloads are wrapped under.
    pub fn payload_type_name(&self) -> &str {
        &self.inner.payload_type_name
    }

    pub fn messages_uri(&self) -> &Url {
        &self.inner.messages_uri
    }

    pub fn publish(&self, key: impl Into<String>, payload: Value) -> ApiResult<SuccessResult> {
        self.send(&Message::new_publish_message(key, payload).build())
    }

    pub fn unpublish(&self, key: impl Into<String>) -> ApiResult<SuccessResult> {
        self.send(&Message::new_unpublish_message(key).build())
    }

    /// Sends one message; a failure status is raised as its typed service error.
    pub fn send(&self, message: &Message) -> ApiResult<SuccessResult> {
        let mut statuses = self.send_multi(std::slice::from_ref(message))?;
        // `send_multi` has already rejected any count other than one.
        match statuses.pop() {
            Some(status) => status.into_result(),
            None => Err(Error::communication(202, "Expected 1 message statuses, received 0")
                .with_uri(self.inner.messages_uri.clone())),
        }
    }

    /// Sends a batch in one request. Per-message failures are returned, not raised.
    pub fn send_multi(&self, messages: &[Message]) -> ApiResult<Vec<MessageStatus>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.encode_batch(messages)?;
        let inner = &self.inner;
        let request = inner
            .connection
            .request(Method::Post, inner.messages_uri.clone(), Some(body));
        tracing::debug!(
            channel = %inner.channel,
            messages = messages.len(),
            "publishing batch"
        );
        let response = inner.connection.execute(&request, "POST")?;
        self.handle_ingestion_response(response, messages.len())
            .map_err(|err| err.with_uri(inner.messages_uri.clone()))
    }

    /// Raw schema document of this publisher's channel.
    pub fn schema(&self) -> ApiResult<String> {
        self.inner
            .connection
            .fetch_schema(self.inner.schema_uri.clone())
    }

    pub fn is_ingestion_service_available(&self) -> ApiResult<bool> {
        self.inner.connection.check_health()
    }

    fn encode_batch(&self, messages: &[Message]) -> ApiResult<String> {
        let encoder = self.inner.connection.encoder();
        let mut body = String::new();
        for message in messages {
            body.push_str(&encoder.encode(message, &self.inner.payload_type_name)?);
        }
        Ok(body)
    }

    fn handle_ingestion_response(
        &self,
        response: HttpResponse,
        expected: usize,
    ) -> ApiResult<Vec<MessageStatus>> {
        match response.status {
            202 => {
                let statuses = parse_message_statuses(202, &response.body)?;
                if statuses.len() != expected {
                    tracing::warn!(
                        channel = %self.inner.channel,
                        expected,
                        received = statuses.len(),
                        "status count does not match message count"
                    );
                    return Err(Error::communication(
                        202,
                        format!(
                            "Expected {expected} message statuses, received {}",
                            statuses.len()
                        ),
                    ));
                }
                Ok(statuses)
            }
            401 => Err(Error::authentication()),
            status @ (400 | 403 | 500) => {
                let failure = parse_failure_response(status, &response.body)?;
                tracing::debug!(
                    channel = %self.inner.channel,
                    status,
                    error_code = failure.error_code(),
                    "ingestion request rejected"
                );
                Err(failure.to_error().with_status(status))
            }
            status => Err(Error::communication(status, response.reason_phrase())),
        }
    }
}
