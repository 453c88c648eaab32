//! Protocol Module
//!
//! Defines the wire protocol replicator calls travel over between nodes.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Kind (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! Kind 0x01 (CALL): payload is method_len (2) + method + args
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR (payload: message)
//! - 0x03: NOT_IMPLEMENTED
//! - 0x04: NOT_CONVERTIBLE
//! - 0x05: NO_DATABASE_CONNECTION
//! - 0x06: INVALID_KEY (payload: message)

mod codec;
mod request;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use request::{Request, CALL_KIND};
pub use response::{Response, Status};
