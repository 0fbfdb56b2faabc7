//! Purpose: Configure and validate a connection to one ingestion service.
//! Exports: `StreamxClient`, `StreamxClientBuilder`, `INGESTION_ENDPOINT_BASE_PATH`.
//! Role: Entry point that validates endpoints eagerly and hands out channel publishers.
//! Invariants: Server and ingestion URIs are absolute http(s) URLs once a client exists.
//! Invariants: Channel URIs are built by segment pushes, so channel names are percent-encoded.
//! Notes: The schema fetch and health check live here and are shared with `Publisher`.
#![allow(clippy::result_large_err)]

use super::publisher::Publisher;
use super::transport::{HttpRequest, HttpRequester, HttpResponse, Method, UreqRequester};
use crate::core::encode::{DefaultJsonEncoder, JsonEncoder, payload_type_name};
use crate::core::error::{Error, ErrorKind};
use crate::core::status::RESPONSE_NOT_PARSED;
use serde_json::Value;
use std::sync::Arc;
use url::{ParseError, Url};

pub const INGESTION_ENDPOINT_BASE_PATH: &str = "/ingestion/v1";

const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

type ApiResult<T> = Result<T, Error>;

pub struct StreamxClientBuilder {
    server_url: String,
    ingestion_base_path: String,
    auth_token: Option<String>,
    http_requester: Option<Arc<dyn HttpRequester>>,
    json_encoder: Option<Arc<dyn JsonEncoder>>,
}

impl StreamxClientBuilder {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ingestion_base_path: INGESTION_ENDPOINT_BASE_PATH.to_string(),
            auth_token: None,
            http_requester: None,
            json_encoder: None,
        }
    }

    pub fn ingestion_base_path(mut self, path: impl Into<String>) -> Self {
        self.ingestion_base_path = path.into();
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn http_requester(mut self, requester: Arc<dyn HttpRequester>) -> Self {
        self.http_requester = Some(requester);
        self
    }

    pub fn json_encoder(mut self, encoder: Arc<dyn JsonEncoder>) -> Self {
        self.json_encoder = Some(encoder);
        self
    }

    /// Validates both endpoints; no request is made.
    pub fn build(self) -> ApiResult<StreamxClient> {
        let endpoint = format!("{}{}", self.server_url, self.ingestion_base_path);
        let server_url = parse_endpoint(&self.server_url, &endpoint)?;
        let base_segments: Vec<&str> = self
            .ingestion_base_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let ingestion_url = push_segments(&server_url, &base_segments);
        let connection = Connection {
            server_url,
            ingestion_url,
            token: self.auth_token.filter(|token| !token.is_empty()),
            requester: self
                .http_requester
                .unwrap_or_else(|| Arc::new(UreqRequester::new())),
            encoder: self
                .json_encoder
                .unwrap_or_else(|| Arc::new(DefaultJsonEncoder)),
        };
        Ok(StreamxClient {
            connection: Arc::new(connection),
        })
    }
}

#[derive(Clone)]
pub struct StreamxClient {
    connection: Arc<Connection>,
}

impl StreamxClient {
    pub fn builder(server_url: impl Into<String>) -> StreamxClientBuilder {
        StreamxClientBuilder::new(server_url)
    }

    pub fn ingestion_url(&self) -> &Url {
        &self.connection.ingestion_url
    }

    /// Creates a publisher bound to `channel`, deriving the payload type name from
    /// `channel_schema_name` up front.
    pub fn new_publisher(
        &self,
        channel: impl Into<String>,
        channel_schema_name: impl Into<String>,
    ) -> ApiResult<Publisher> {
        let channel = channel.into();
        let channel_schema_name = channel_schema_name.into();
        if channel.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("Channel name must not be empty"));
        }
        let payload_type_name = payload_type_name(&channel_schema_name)?;
        Ok(Publisher::new(
            Arc::clone(&self.connection),
            channel,
            channel_schema_name,
            payload_type_name,
        ))
    }

    /// Raw schema document of `channel`, as returned by the server.
    pub fn channel_schema(&self, channel: &str) -> ApiResult<String> {
        let uri = self.connection.channel_uri(channel, "schema");
        self.connection.fetch_schema(uri)
    }

    pub fn is_ingestion_service_available(&self) -> ApiResult<bool> {
        self.connection.check_health()
    }
}

/// Immutable per-client state shared by every publisher it creates.
pub(crate) struct Connection {
    server_url: Url,
    ingestion_url: Url,
    token: Option<String>,
    requester: Arc<dyn HttpRequester>,
    encoder: Arc<dyn JsonEncoder>,
}

impl Connection {
    pub(crate) fn encoder(&self) -> &dyn JsonEncoder {
        self.encoder.as_ref()
    }

    pub(crate) fn channel_uri(&self, channel: &str, resource: &str) -> Url {
        push_segments(&self.ingestion_url, &["channels", channel, resource])
    }

    fn health_uri(&self) -> Url {
        push_segments(&self.server_url, &["q", "health"])
    }

    pub(crate) fn request(&self, method: Method, uri: Url, body: Option<String>) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if body.is_some() {
            headers.push(("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string()));
        }
        HttpRequest {
            method,
            uri,
            headers,
            body,
        }
    }

    /// Runs one request; `label` names the call in the transport error message.
    pub(crate) fn execute(&self, request: &HttpRequest, label: &str) -> ApiResult<HttpResponse> {
        tracing::debug!(method = %request.method, uri = %request.uri, "sending request");
        let response = self.requester.execute(request).map_err(|err| {
            tracing::debug!(uri = %request.uri, error = %err, "transport failure");
            Error::new(ErrorKind::HttpClient)
                .with_message(format!(
                    "{label} request with URI: {} failed due to HTTP client error",
                    request.uri
                ))
                .with_uri(request.uri.clone())
                .with_boxed_source(err)
        })?;
        tracing::debug!(uri = %request.uri, status = response.status, "received response");
        Ok(response)
    }

    pub(crate) fn fetch_schema(&self, uri: Url) -> ApiResult<String> {
        let request = self.request(Method::Get, uri, None);
        let response = self.execute(&request, "Schema GET")?;
        match response.status {
            200 => String::from_utf8(response.body).map_err(|err| {
                Error::communication(200, RESPONSE_NOT_PARSED)
                    .with_uri(request.uri.clone())
                    .with_source(err)
            }),
            401 => Err(Error::authentication().with_uri(request.uri)),
            status => Err(Error::communication(status, response.reason_phrase())
                .with_uri(request.uri)),
        }
    }

    pub(crate) fn check_health(&self) -> ApiResult<bool> {
        let request = self.request(Method::Get, self.health_uri(), None);
        let response = self.execute(&request, "HealthCheck GET")?;
        if response.status != 200 {
            return Ok(false);
        }
        let up = serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("status").and_then(Value::as_str).map(|s| s == "UP"))
            .unwrap_or(false);
        if !up {
            tracing::warn!(uri = %request.uri, "health endpoint answered 200 without status UP");
        }
        Ok(up)
    }
}

/// Parses the server URL; errors name `endpoint`, the full ingestion URI it would produce.
fn parse_endpoint(raw: &str, endpoint: &str) -> ApiResult<Url> {
    let malformed = |reason: &str| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("Ingestion endpoint URI: {endpoint} is malformed. {reason}"))
    };
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            return Err(malformed("Relative URI is not supported."));
        }
        Err(err) => return Err(malformed(&format!("{err}.")).with_source(err)),
    };
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(malformed(&format!("Unsupported scheme '{scheme}'.")));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn push_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // http(s) URLs always have a path, so this cannot fail after `parse_endpoint`.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::{StreamxClientBuilder, parse_endpoint, push_segments};
    use crate::core::error::ErrorKind;

    #[test]
    fn relative_server_url_is_rejected_eagerly() {
        let err = StreamxClientBuilder::new("localhost:8080")
            .build()
            .err()
            .expect("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = StreamxClientBuilder::new("/relative").build().err().expect("err");
        assert_eq!(
            err.message(),
            Some("Ingestion endpoint URI: /relative/ingestion/v1 is malformed. Relative URI is not supported.")
        );
    }

    #[test]
    fn malformed_server_url_reports_parser_reason() {
        let err = parse_endpoint("http://exa mple.com", "http://exa mple.com").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(
            err.message()
                .expect("message")
                .starts_with("Ingestion endpoint URI: http://exa mple.com is malformed. ")
        );
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let err = StreamxClientBuilder::new("ftp://localhost")
            .build()
            .err()
            .expect("err");
        assert_eq!(
            err.message(),
            Some("Ingestion endpoint URI: ftp://localhost/ingestion/v1 is malformed. Unsupported scheme 'ftp'.")
        );
    }

    #[test]
    fn channel_segments_are_appended_to_base_path() {
        let base = parse_endpoint("http://localhost:8080/ingestion/v1", "").expect("url");
        let uri = push_segments(&base, &["channels", "pages", "messages"]);
        assert_eq!(
            uri.as_str(),
            "http://localhost:8080/ingestion/v1/channels/pages/messages"
        );

        let base = parse_endpoint("http://localhost:8080/custom/", "").expect("url");
        let uri = push_segments(&base, &["channels", "a b", "schema"]);
        assert_eq!(uri.as_str(), "http://localhost:8080/custom/channels/a%20b/schema");
    }

    #[test]
    fn health_uri_uses_server_url() {
        let base = parse_endpoint("http://localhost:8080", "").expect("url");
        assert_eq!(
            push_segments(&base, &["q", "health"]).as_str(),
            "http://localhost:8080/q/health"
        );
    }

    #[test]
    fn base_path_is_joined_as_path_segments() {
        let cases = [
            ("http://localhost:8080", "/ingestion/v1", "http://localhost:8080/ingestion/v1"),
            ("http://localhost:8080/", "/ingestion/v1", "http://localhost:8080/ingestion/v1"),
            ("http://localhost:8080?x=1", "/ingestion/v1", "http://localhost:8080/ingestion/v1"),
            ("http://localhost:8080/#top", "/ingestion/v1/", "http://localhost:8080/ingestion/v1"),
            ("http://localhost:8080/prefix", "ingestion/v2", "http://localhost:8080/prefix/ingestion/v2"),
        ];
        for (server, base_path, expected) in cases {
            let client = StreamxClientBuilder::new(server)
                .ingestion_base_path(base_path)
                .build()
                .expect("client");
            assert_eq!(client.ingestion_url().as_str(), expected, "server {server}");
            assert_eq!(
                client.connection.channel_uri("p", "messages").as_str(),
                format!("{expected}/channels/p/messages")
            );
        }
    }

    #[test]
    fn server_query_does_not_leak_into_health_uri() {
        let client = StreamxClientBuilder::new("http://localhost:8080/?x=1")
            .build()
            .expect("client");
        assert_eq!(
            client.connection.health_uri().as_str(),
            "http://localhost:8080/q/health"
        );
    }

    #[test]
    fn publisher_requires_schema_suffix() {
        let client = StreamxClientBuilder::new("http://localhost:8080")
            .build()
            .expect("client");
        let err = client
            .new_publisher("pages", "com.acme.Foo")
            .err()
            .expect("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client
            .new_publisher("", "FooIngestionMessage")
            .err()
            .expect("err");
        assert_eq!(err.message(), Some("Channel name must not be empty"));
    }
}
