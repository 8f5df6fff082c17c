//! The replica side of the four-step handshake: PING, REPLCONF listening-port,
//! REPLCONF capa psync2, PSYNC. Runs once at startup before the connection is
//! handed off to the ongoing command-stream reader.

use std::net::TcpStream;

use thiserror::Error;

use crate::network::connection::{Connection, ConnectionError};
use crate::parser::resp::Resp;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connection error during handshake: {0}")]
    Connection(#[from] ConnectionError),
    #[error("unexpected handshake reply: expected {expected}, got {got:?}")]
    Protocol { expected: &'static str, got: Resp },
}

pub struct HandshakeOutcome {
    pub connection: Connection,
    pub rdb: Vec<u8>,
}

/// Connects to `(master_host, master_port)` and runs the handshake,
/// announcing `replica_port` as this replica's own listening port.
pub fn perform(
    master_host: &str,
    master_port: u16,
    replica_port: u16,
) -> Result<HandshakeOutcome, HandshakeError> {
    let stream = TcpStream::connect((master_host, master_port))?;
    let mut conn = Connection::new(stream);

    send_ping(&mut conn)?;
    send_replconf_listening_port(&mut conn, replica_port)?;
    send_replconf_capa(&mut conn)?;
    send_psync(&mut conn)?;
    let rdb = conn.read_snapshot()?;

    Ok(HandshakeOutcome { connection: conn, rdb })
}

fn command(parts: &[&[u8]]) -> Resp {
    Resp::Array(parts.iter().map(|p| Resp::bulk(p.to_vec())).collect())
}

fn expect_simple(conn: &mut Connection, expected: &'static str) -> Result<(), HandshakeError> {
    let (reply, _) = conn.read_frame()?;
    match &reply {
        Resp::Simple(s) if s.eq_ignore_ascii_case(expected) => Ok(()),
        other => Err(HandshakeError::Protocol {
            expected,
            got: other.clone(),
        }),
    }
}

fn send_ping(conn: &mut Connection) -> Result<(), HandshakeError> {
    conn.write_frame(&command(&[b"PING"]))?;
    expect_simple(conn, "PONG")
}

fn send_replconf_listening_port(conn: &mut Connection, port: u16) -> Result<(), HandshakeError> {
    let port = port.to_string();
    conn.write_frame(&command(&[b"REPLCONF", b"listening-port", port.as_bytes()]))?;
    expect_simple(conn, "OK")
}

fn send_replconf_capa(conn: &mut Connection) -> Result<(), HandshakeError> {
    conn.write_frame(&command(&[b"REPLCONF", b"capa", b"psync2"]))?;
    expect_simple(conn, "OK")
}

fn send_psync(conn: &mut Connection) -> Result<(), HandshakeError> {
    conn.write_frame(&command(&[b"PSYNC", b"?", b"-1"]))?;
    let (reply, _) = conn.read_frame()?;
    match reply {
        Resp::Simple(ref s) if s.to_uppercase().starts_with("FULLRESYNC") => Ok(()),
        other => Err(HandshakeError::Protocol {
            expected: "FULLRESYNC",
            got: other,
        }),
    }
}
