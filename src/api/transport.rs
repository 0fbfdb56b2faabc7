//! Purpose: Define the injected HTTP capability and its default `ureq` implementation.
//! Exports: `HttpRequester`, `HttpRequest`, `HttpResponse`, `Method`, `TransportError`, `UreqRequester`, `TransportOptions`.
//! Role: Seam between the ingestion protocol and whatever HTTP stack the caller provides.
//! Invariants: Any received status (2xx or not) is a response; only failures to get one are errors.
//! Invariants: Response bodies are read to completion before being returned.
//! Notes: Pooling, TLS, timeouts, and retries belong to the transport, never to the publisher.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use std::error::Error as StdError;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const BODY_CHUNK_BYTES: usize = 8 * 1024;

pub type TransportError = Box<dyn StdError + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: String::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The server's reason phrase, or the canonical one when the transport supplied none.
    pub fn reason_phrase(&self) -> &str {
        if self.reason.is_empty() {
            canonical_reason(self.status)
        } else {
            &self.reason
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Blocking HTTP capability: send one request, return status, headers, and full body.
///
/// Implementations must be `Send + Sync` so a `Publisher` can be shared across threads;
/// whether concurrent calls are actually safe is up to the implementation.
pub trait HttpRequester: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    pub timeout: Option<Duration>,
    pub tls_ca_file: Option<PathBuf>,
}

/// Default transport backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqRequester {
    agent: ureq::Agent,
}

impl UreqRequester {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    pub fn from_options(options: &TransportOptions) -> Result<Self, Error> {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(path) = &options.tls_ca_file {
            builder = builder.tls_config(Arc::new(tls_config_from_ca_file(path)?));
        }
        Ok(Self {
            agent: builder.build(),
        })
    }
}

impl Default for UreqRequester {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequester for UreqRequester {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut call = self
            .agent
            .request(request.method.as_str(), request.uri.as_str());
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        let result = match &request.body {
            Some(body) => call.send_string(body),
            None => call.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(Box::new(transport)),
        };

        let status = response.status();
        let reason = response.status_text().to_string();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = read_body(response.into_reader())?;
        Ok(HttpResponse {
            status,
            reason,
            headers,
            body,
        })
    }
}

fn read_body(mut reader: impl Read) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    let mut chunk = [0u8; BODY_CHUNK_BYTES];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&chunk[..read]);
    }
}

fn invalid_ca_file(path: &Path, problem: &str) -> Error {
    Error::new(ErrorKind::InvalidArgument)
        .with_message(format!("CA file {}: {problem}", path.display()))
}

/// Root store made only of the PEM certificates in `path`.
fn tls_config_from_ca_file(path: &Path) -> Result<ureq::rustls::ClientConfig, Error> {
    let pem = std::fs::read(path)
        .map_err(|err| invalid_ca_file(path, "cannot be read").with_source(err))?;
    let certs = rustls_pemfile::certs(&mut Cursor::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid_ca_file(path, "is not valid PEM").with_source(err))?;
    if certs.is_empty() {
        return Err(invalid_ca_file(path, "has no CERTIFICATE blocks"));
    }

    let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut roots = ureq::rustls::RootCertStore::empty();
    if roots.add_parsable_certificates(certs).0 == 0 {
        return Err(invalid_ca_file(path, "has no usable certificates"));
    }
    Ok(ureq::rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

pub(crate) fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpResponse, Method, TransportOptions, UreqRequester, read_body};
    use crate::core::error::ErrorKind;

    #[test]
    fn reason_phrase_falls_back_to_canonical() {
        assert_eq!(HttpResponse::new(408, "").reason_phrase(), "Request Timeout");
        assert_eq!(
            HttpResponse::new(500, "").with_reason("Boom").reason_phrase(),
            "Boom"
        );
        assert_eq!(HttpResponse::new(599, "").reason_phrase(), "");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse::new(200, "").with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("accept"), None);
    }

    #[test]
    fn body_reader_accumulates_all_chunks() {
        let data = vec![b'x'; 20_000];
        let body = read_body(&data[..]).expect("body");
        assert_eq!(body.len(), 20_000);
    }

    #[test]
    fn missing_ca_file_is_invalid_argument() {
        let options = TransportOptions {
            timeout: None,
            tls_ca_file: Some("/nonexistent/streamx-ca.pem".into()),
        };
        let err = UreqRequester::from_options(&options).err().expect("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            err.message(),
            Some("CA file /nonexistent/streamx-ca.pem: cannot be read")
        );
    }

    fn ca_file_error(contents: &str) -> String {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, contents).expect("write ca");
        let options = TransportOptions {
            timeout: None,
            tls_ca_file: Some(path.clone()),
        };
        let err = UreqRequester::from_options(&options).err().expect("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let message = err.message().expect("message");
        let prefix = format!("CA file {}: ", path.display());
        message.strip_prefix(&prefix).expect("path prefix").to_string()
    }

    #[test]
    fn ca_file_without_pem_blocks_is_rejected() {
        assert_eq!(ca_file_error("not a certificate\n"), "has no CERTIFICATE blocks");
    }

    #[test]
    fn ca_file_with_broken_base64_is_rejected() {
        let pem = "-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert_eq!(ca_file_error(pem), "is not valid PEM");
    }

    #[test]
    fn ca_file_with_non_der_certificate_is_rejected() {
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----\n";
        assert_eq!(ca_file_error(pem), "has no usable certificates");
    }

    #[test]
    fn method_names_are_uppercase() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
    }
}
