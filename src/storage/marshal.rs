//! Record marshaling
//!
//! Records are stored and shipped between nodes as bincode.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
