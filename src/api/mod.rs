//! Purpose: Define the stable public Rust API boundary for the StreamX ingestion client.
//! Exports: Message model, encoder seam, transport seam, client, publisher, and error types.
//! Role: Public, additive-only surface; hides the protocol core modules.
//! Invariants: This module is the only public path to core types.
//! Invariants: Internal parsers remain private and are not directly exposed.

mod client;
mod publisher;
mod transport;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::encode::{
    DefaultJsonEncoder, JsonEncoder, SCHEMA_NAME_SUFFIX, decode_message, payload_from_slice,
    payload_type_name,
};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::message::{Action, Message, MessageBuilder, Properties};
pub use crate::core::split::split_jsons;
pub use crate::core::status::{FailureResponse, MessageStatus, SuccessResult};
pub use client::{INGESTION_ENDPOINT_BASE_PATH, StreamxClient, StreamxClientBuilder};
pub use publisher::Publisher;
pub use transport::{
    HttpRequest, HttpRequester, HttpResponse, Method, TransportError, TransportOptions,
    UreqRequester,
};
