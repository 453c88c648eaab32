//! TCP Client
//!
//! One replicator handle to one peer address. The stream is dialed on
//! first use and kept for later calls; any I/O failure drops it so the
//! next call dials again.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::connection::RpcClient;
use crate::error::{ChargeError, Result};
use crate::protocol::{read_response, write_request, Request};

struct Stream {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Stream {
    fn connect(addr: &SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(addr, timeout)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        self.writer.get_ref().set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn round_trip(&mut self, request: &Request) -> Result<Vec<u8>> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)?.into_result()
    }
}

/// Replicator client over the binary protocol
pub struct TcpClient {
    address: String,
    stream: Mutex<Option<Stream>>,
}

impl TcpClient {
    /// Create a client; nothing is dialed until the first call
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a stream is currently open
    pub fn is_connected(&self) -> bool {
        self.stream.lock().is_some()
    }

    fn resolve(&self) -> Result<SocketAddr> {
        self.address
            .to_socket_addrs()
            .map_err(|e| ChargeError::Transport(format!("resolve {}: {}", self.address, e)))?
            .next()
            .ok_or_else(|| ChargeError::Transport(format!("resolve {}: no address", self.address)))
    }

    fn dial(&self, timeout: Duration) -> Result<Stream> {
        let addr = self.resolve()?;
        debug!(address = %self.address, "dialing peer");
        Stream::connect(&addr, timeout).map_err(|e| transport(&self.address, e))
    }
}

impl RpcClient for TcpClient {
    fn call(&self, method: &str, args: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let started = Instant::now();
        let request = Request::new(method, args.to_vec());
        let mut slot = self.stream.lock();

        // A kept stream may have been closed by the peer while idle; such
        // a failure gets one retry on a fresh dial.
        let mut attempt_reused = slot.is_some();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                *slot = None;
                return Err(ChargeError::Timeout(timeout));
            }

            if slot.is_none() {
                *slot = Some(self.dial(remaining)?);
            }
            let Some(stream) = slot.as_mut() else {
                continue;
            };

            let result = stream
                .set_timeout(remaining)
                .and_then(|_| stream.round_trip(&request));
            match result {
                Ok(reply) => {
                    trace!(address = %self.address, method, "call answered");
                    return Ok(reply);
                }
                Err(e) if is_connection_error(&e) => {
                    *slot = None;
                    if attempt_reused {
                        debug!(address = %self.address, error = %e, "stale stream, redialing");
                        attempt_reused = false;
                        continue;
                    }
                    return Err(transport(&self.address, e));
                }
                // The peer answered; the stream stays usable
                Err(e) => return Err(e),
            }
        }
    }
}

/// Failures after which the stream can no longer be trusted
fn is_connection_error(err: &ChargeError) -> bool {
    matches!(err, ChargeError::Io(_) | ChargeError::Protocol(_))
}

fn transport(address: &str, err: ChargeError) -> ChargeError {
    match err {
        ChargeError::Io(ref e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
        {
            ChargeError::Transport(format!("{}: timed out: {}", address, e))
        }
        ChargeError::Io(e) => ChargeError::Transport(format!("{}: {}", address, e)),
        ChargeError::Protocol(msg) => ChargeError::Transport(format!("{}: {}", address, msg)),
        other => other,
    }
}
