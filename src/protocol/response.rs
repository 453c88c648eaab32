//! Response definitions
//!
//! Status codes carry the sentinel errors across the wire so a caller can
//! tell a peer's miss from a peer's failure.

use crate::error::{ChargeError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    NotImplemented = 0x03,
    NotConvertible = 0x04,
    NoDatabaseConn = 0x05,
    InvalidKey = 0x06,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::NotImplemented),
            0x04 => Some(Status::NotConvertible),
            0x05 => Some(Status::NoDatabaseConn),
            0x06 => Some(Status::InvalidKey),
            _ => None,
        }
    }
}

/// A response to send to a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Encoded reply for OK, error message otherwise
    pub payload: Vec<u8>,
}

impl Response {
    /// Create an OK response
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: Vec::new(),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: message.as_bytes().to_vec(),
        }
    }

    /// Map a dispatch result onto the wire
    pub fn from_result(result: Result<Vec<u8>>) -> Self {
        let err = match result {
            Ok(payload) => return Self::ok(payload),
            Err(e) => e,
        };
        let status = match &err {
            ChargeError::NotFound => Status::NotFound,
            ChargeError::NotImplemented => Status::NotImplemented,
            ChargeError::NotConvertible => Status::NotConvertible,
            ChargeError::NoDatabaseConn => Status::NoDatabaseConn,
            ChargeError::InvalidKey(_) => Status::InvalidKey,
            _ => Status::Error,
        };
        let payload = match err {
            ChargeError::InvalidKey(msg) => msg.into_bytes(),
            ChargeError::NotFound
            | ChargeError::NotImplemented
            | ChargeError::NotConvertible
            | ChargeError::NoDatabaseConn => Vec::new(),
            other => other.to_string().into_bytes(),
        };
        Self { status, payload }
    }

    /// Turn a received response back into the caller's result
    ///
    /// Free-form errors come back as `Remote` so they are never taken for
    /// a connectivity failure.
    pub fn into_result(self) -> Result<Vec<u8>> {
        if self.status == Status::Ok {
            return Ok(self.payload);
        }
        let message = String::from_utf8_lossy(&self.payload).into_owned();
        Err(match self.status {
            Status::NotFound => ChargeError::NotFound,
            Status::NotImplemented => ChargeError::NotImplemented,
            Status::NotConvertible => ChargeError::NotConvertible,
            Status::NoDatabaseConn => ChargeError::NoDatabaseConn,
            Status::InvalidKey => ChargeError::InvalidKey(message),
            Status::Ok | Status::Error => ChargeError::Remote(message),
        })
    }
}
