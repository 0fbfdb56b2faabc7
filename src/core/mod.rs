// Core modules implementing the message model, wire encoding, response parsing, and errors.
pub mod encode;
pub mod error;
pub mod message;
pub mod split;
pub mod status;
