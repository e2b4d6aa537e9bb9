//! Blocking evaluation client.
//!
//! One connection carries strictly ordered request/response pairs: the
//! worker writes one request, then blocks until the full response
//! arrives. There is never more than one request in flight per
//! connection, so no request ids or routing are needed.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::path::Path;

use thiserror::Error;

use crate::codec::{decode_response, encode_request, DecodeError};
use crate::protocol::{EvalRequest, EvalResponse, RESPONSE_LEN};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("server disconnected")]
    Disconnected,
    #[error("evaluator returned {got} responses for a batch of {expected}")]
    BadBatch { got: usize, expected: usize },
}

pub(crate) enum Stream {
    Tcp(TcpStream),
    Uds(UnixStream),
}

impl Stream {
    pub(crate) fn try_clone(&self) -> io::Result<Stream> {
        match self {
            Stream::Tcp(s) => s.try_clone().map(Stream::Tcp),
            Stream::Uds(s) => s.try_clone().map(Stream::Uds),
        }
    }

    pub(crate) fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.shutdown(how),
            Stream::Uds(s) => s.shutdown(how),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Uds(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Uds(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Uds(s) => s.flush(),
        }
    }
}

/// Read exactly `buf.len()` bytes. `Ok(false)` means the peer closed the
/// stream cleanly before the first byte; a close mid-record is an error.
pub(crate) fn read_record(stream: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed mid-record",
            ));
        }
        filled += n;
    }
    Ok(true)
}

/// One worker's connection to the batching evaluation server.
pub struct GatewayClient {
    stream: Stream,
}

impl GatewayClient {
    pub fn connect_tcp<A: ToSocketAddrs>(addr: A) -> Result<GatewayClient, GatewayError> {
        let s = TcpStream::connect(addr)?;
        s.set_nodelay(true)?;
        Ok(GatewayClient {
            stream: Stream::Tcp(s),
        })
    }

    pub fn connect_uds<P: AsRef<Path>>(path: P) -> Result<GatewayClient, GatewayError> {
        let s = UnixStream::connect(path)?;
        Ok(GatewayClient {
            stream: Stream::Uds(s),
        })
    }

    /// Submit one position and block until its evaluation arrives.
    pub fn request(&mut self, req: &EvalRequest) -> Result<EvalResponse, GatewayError> {
        let out = encode_request(req);
        self.stream.write_all(&out)?;
        self.stream.flush()?;
        let mut buf = [0u8; RESPONSE_LEN];
        if !read_record(&mut self.stream, &mut buf)? {
            return Err(GatewayError::Disconnected);
        }
        Ok(decode_response(&buf)?)
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
