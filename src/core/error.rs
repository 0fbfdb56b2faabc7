//! Purpose: Define the single error type surfaced by every client operation.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`, message template helpers.
//! Role: Shared taxonomy for configuration, encoding, transport, protocol, and service failures.
//! Invariants: Messages are built from fixed templates so callers can match them exactly.
//! Invariants: `ErrorKind::from_error_code` is total; unknown codes map to `ServiceFailure`.
use std::error::Error as StdError;
use std::fmt;
use url::Url;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Client-side configuration or usage mistake, detected before any I/O.
    InvalidArgument,
    /// The message could not be turned into a request body.
    Encoding,
    /// The transport failed before a response was received.
    HttpClient,
    /// Unexpected status code or a response body that does not fit the protocol.
    Communication,
    /// HTTP 401 from the server.
    Authentication,
    UnsupportedChannel,
    ForbiddenChannel,
    IngestionInputInvalid,
    ServerError,
    SendingEventError,
    /// Fallback for server error codes outside the known table.
    ServiceFailure,
}

const ERROR_CODE_TABLE: &[(&str, ErrorKind)] = &[
    ("UNSUPPORTED_CHANNEL", ErrorKind::UnsupportedChannel),
    ("FORBIDDEN_CHANNEL", ErrorKind::ForbiddenChannel),
    ("INVALID_INGESTION_INPUT", ErrorKind::IngestionInputInvalid),
    ("SERVER_ERROR", ErrorKind::ServerError),
    ("SENDING_EVENT_ERROR", ErrorKind::SendingEventError),
];

impl ErrorKind {
    /// Exact, case-sensitive lookup of a server `errorCode`.
    pub fn from_error_code(code: &str) -> Self {
        ERROR_CODE_TABLE
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::ServiceFailure)
    }

    pub fn is_service_error(self) -> bool {
        matches!(
            self,
            ErrorKind::UnsupportedChannel
                | ErrorKind::ForbiddenChannel
                | ErrorKind::IngestionInputInvalid
                | ErrorKind::ServerError
                | ErrorKind::SendingEventError
                | ErrorKind::ServiceFailure
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    status: Option<u16>,
    uri: Option<Url>,
    error_code: Option<String>,
    error_message: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            uri: None,
            error_code: None,
            error_message: None,
            source: None,
        }
    }

    /// Map a server-reported failure onto the typed taxonomy.
    pub fn service(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        let error_code = error_code.into();
        let error_message = error_message.into();
        let mut err = Error::new(ErrorKind::from_error_code(&error_code))
            .with_message(known_error_message(&error_code, &error_message));
        err.error_code = Some(error_code);
        err.error_message = Some(error_message);
        err
    }

    pub(crate) fn communication(status: u16, detail: impl fmt::Display) -> Self {
        Error::new(ErrorKind::Communication)
            .with_message(communication_error_message(status, detail))
            .with_status(status)
    }

    pub(crate) fn authentication() -> Self {
        Error::new(ErrorKind::Authentication)
            .with_message("Authentication failed. Make sure that the given token is valid.")
            .with_status(401)
    }

    pub(crate) fn encoding(detail: impl fmt::Display) -> Self {
        Error::new(ErrorKind::Encoding).with_message(format!("JSON encoding error: {detail}"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub(crate) fn with_boxed_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{message}"),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub(crate) fn known_error_message(error_code: &str, error_message: &str) -> String {
    format!("Ingestion REST endpoint known error. Code: {error_code}. Message: {error_message}")
}

pub(crate) fn communication_error_message(status: u16, detail: impl fmt::Display) -> String {
    format!("Communication error. Response status: {status}. Message: {detail}")
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidArgument => 2,
        ErrorKind::Encoding => 3,
        ErrorKind::HttpClient => 4,
        ErrorKind::Communication => 5,
        ErrorKind::Authentication => 6,
        ErrorKind::UnsupportedChannel => 10,
        ErrorKind::ForbiddenChannel => 11,
        ErrorKind::IngestionInputInvalid => 12,
        ErrorKind::ServerError => 13,
        ErrorKind::SendingEventError => 14,
        ErrorKind::ServiceFailure => 15,
    }
}
