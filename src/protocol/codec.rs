//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬──────────────┬──────────┬────────────┐
//! │ Kind (1) │ Len (4)  │ MethodLen(2) │  Method  │    Args    │
//! └──────────┴──────────┴──────────────┴──────────┴────────────┘
//! ```
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! Integers are big-endian.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use super::{Request, Response, Status, CALL_KIND};
use crate::error::{ChargeError, Result};

/// Header size: 1 byte kind/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Method name length prefix inside a request payload
const METHOD_LEN_SIZE: usize = 2;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let method = request.method.as_bytes();
    if method.len() > u16::MAX as usize {
        return Err(ChargeError::Protocol(format!(
            "Method name too long: {} bytes",
            method.len()
        )));
    }

    let payload_len = METHOD_LEN_SIZE + method.len() + request.args.len();
    check_payload_len(payload_len)?;

    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload_len);
    message.put_u8(CALL_KIND);
    message.put_u32(payload_len as u32);
    message.put_u16(method.len() as u16);
    message.put_slice(method);
    message.put_slice(&request.args);

    Ok(message.to_vec())
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (kind, payload) = split_frame(bytes, "request")?;
    if kind != CALL_KIND {
        return Err(ChargeError::Protocol(format!(
            "Unknown request kind: 0x{:02x}",
            kind
        )));
    }

    if payload.len() < METHOD_LEN_SIZE {
        return Err(ChargeError::Protocol(
            "Request: missing method length".to_string(),
        ));
    }
    let method_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let method_end = METHOD_LEN_SIZE + method_len;
    if payload.len() < method_end {
        return Err(ChargeError::Protocol(format!(
            "Request: incomplete method (expected {}, got {})",
            method_len,
            payload.len() - METHOD_LEN_SIZE
        )));
    }

    let method = std::str::from_utf8(&payload[METHOD_LEN_SIZE..method_end])
        .map_err(|e| ChargeError::Protocol(format!("Request: method is not UTF-8: {}", e)))?;

    Ok(Request::new(method, payload[method_end..].to_vec()))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    check_payload_len(response.payload.len())?;

    let mut message = BytesMut::with_capacity(HEADER_SIZE + response.payload.len());
    message.put_u8(response.status as u8);
    message.put_u32(response.payload.len() as u32);
    message.put_slice(&response.payload);

    Ok(message.to_vec())
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;
    let status = Status::from_byte(status_byte).ok_or_else(|| {
        ChargeError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    Ok(Response {
        status,
        payload: payload.to_vec(),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let frame = read_frame(reader)?;
    decode_request(&frame)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader)?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Framing
// =============================================================================

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(ChargeError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

/// Split a buffered frame into its first byte and payload
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(ChargeError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    check_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ChargeError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

/// Read header then payload, returning the whole frame
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    check_payload_len(payload_len)?;

    let mut frame = vec![0u8; HEADER_SIZE + payload_len];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..])?;
    }
    Ok(frame)
}
