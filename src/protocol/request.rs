//! Request definitions
//!
//! A request names one replicator method and carries its bincode-encoded
//! argument untouched; the protocol layer never looks inside it.

/// Frame kind byte for a method call
pub const CALL_KIND: u8 = 0x01;

/// A method call from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Fully qualified method, e.g. `ReplicatorSv1.GetAccount`
    pub method: String,

    /// Encoded method argument
    pub args: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, args: Vec<u8>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}
