//! A buffered TCP connection that frames RESP values in and out. Generalises
//! the teacher's offset-tracked `Vec<u8>` buffer into a `BytesMut`, which
//! gives us `split_to`/`advance` instead of hand-rolled memmoves.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use bytes::BytesMut;

use crate::parser::rdb::decode_snapshot;
use crate::parser::resp::{decode, FrameError, Resp};

const READ_CHUNK: usize = 4096;

pub type Result<T> = std::result::Result<T, ConnectionError>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Eof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// A writable handle to the same socket, independent of this connection's
    /// read buffer. Used to register a replica for propagation while this
    /// connection keeps reading `REPLCONF ACK` frames on the original handle.
    pub fn try_clone(&self) -> std::io::Result<TcpStream> {
        self.stream.try_clone()
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk)?;
        if n == 0 {
            return Err(ConnectionError::Eof);
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    /// Read exactly one RESP frame, blocking for more bytes as needed.
    /// Returns the decoded value and the number of wire bytes it occupied.
    pub fn read_frame(&mut self) -> Result<(Resp, usize)> {
        loop {
            match decode(&self.buffer) {
                Ok((value, len)) => {
                    self.buffer.split_to(len);
                    return Ok((value, len));
                }
                Err(FrameError::Incomplete) => self.fill_buffer()?,
                Err(e) => return Err(ConnectionError::Frame(e)),
            }
        }
    }

    /// Read the out-of-band snapshot blob that follows a master's `+FULLRESYNC`.
    pub fn read_snapshot(&mut self) -> Result<Vec<u8>> {
        loop {
            match decode_snapshot(&self.buffer) {
                Ok(frame) => {
                    self.buffer.split_to(frame.len);
                    return Ok(frame.payload);
                }
                Err(FrameError::Incomplete) => self.fill_buffer()?,
                Err(e) => return Err(ConnectionError::Frame(e)),
            }
        }
    }

    pub fn write_frame(&mut self, value: &Resp) -> Result<()> {
        self.stream.write_all(&value.encode())?;
        Ok(())
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        Ok(())
    }
}
