//! Purpose: Client library for the StreamX REST ingestion service.
//! Exports: `api` (client, publisher, transport seam, message model, errors).
//! Role: Library backing the `streamx` CLI and embedding applications.
//! Invariants: `api` is the only public path; `core` stays an internal protocol layer.
//! Invariants: Every operation issues at most one blocking HTTP request through the injected transport.
pub mod api;
mod core;
