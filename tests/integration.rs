//! Black-box integration tests: each spins up a real server on an ephemeral
//! port in a background thread and drives it with a plain `TcpStream`,
//! exercising the wire protocol the way a real client would.

use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use redikv::network::connection::Connection;
use redikv::parser::resp::Resp;
use redikv::server::bootstrap;
use redikv::server::config::Config;

fn start_server(args: &[&str]) -> u16 {
    let mut argv = vec!["redikv"];
    argv.extend_from_slice(args);
    let config = <Config as clap::Parser>::parse_from(argv);
    let (listener, server) = bootstrap::bind(config).expect("failed to bind test server");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || bootstrap::serve(listener, server));
    // Give the accept loop a moment to start before the first connection attempt.
    thread::sleep(Duration::from_millis(20));
    port
}

fn connect(port: u16) -> Connection {
    let stream = TcpStream::connect(("127.0.0.1", port)).expect("failed to connect to test server");
    Connection::new(stream)
}

fn command(parts: &[&[u8]]) -> Resp {
    Resp::array_of_bulks(parts.iter().map(|p| p.to_vec()))
}

#[test]
fn ping_replies_pong() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);
    conn.write_frame(&command(&[b"PING"])).unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::simple("PONG"));
}

#[test]
fn echo_returns_the_same_bytes() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);
    conn.write_frame(&command(&[b"ECHO", b"hello world"]))
        .unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::bulk(b"hello world".to_vec()));
}

#[test]
fn set_then_get_roundtrips_a_value() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);

    conn.write_frame(&command(&[b"SET", b"foo", b"bar"]))
        .unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::simple("OK"));

    conn.write_frame(&command(&[b"GET", b"foo"])).unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::bulk(b"bar".to_vec()));
}

#[test]
fn get_on_a_missing_key_returns_nil() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);
    conn.write_frame(&command(&[b"GET", b"does-not-exist"]))
        .unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::nil());
}

#[test]
fn set_with_px_expires_the_key() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);

    conn.write_frame(&command(&[b"SET", b"k", b"v", b"PX", b"20"]))
        .unwrap();
    conn.read_frame().unwrap();

    thread::sleep(Duration::from_millis(60));

    conn.write_frame(&command(&[b"GET", b"k"])).unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::nil());
}

#[test]
fn info_replication_reports_master_role() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);
    conn.write_frame(&command(&[b"INFO", b"replication"]))
        .unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    let body = match reply {
        Resp::Bulk(Some(bytes)) => String::from_utf8(bytes).unwrap(),
        other => panic!("expected a bulk string, got {other:?}"),
    };
    assert!(body.starts_with("role:master\n"));
    assert!(body.contains("master_repl_offset:0"));
}

#[test]
fn replica_handshake_and_propagation() {
    let master_port = start_server(&["--port", "0"]);

    // Reserve a port up front so the replica can advertise it before binding.
    let reserved = TcpListener::bind("127.0.0.1:0").unwrap();
    let replica_port = reserved.local_addr().unwrap().port();
    drop(reserved);

    let master_addr = format!("127.0.0.1 {master_port}");
    let replica_config_port = replica_port.to_string();
    let replica_port = start_server(&[
        "--port",
        &replica_config_port,
        "--replicaof",
        &master_addr,
    ]);
    assert_eq!(replica_port.to_string(), replica_config_port);

    // Let the handshake complete.
    thread::sleep(Duration::from_millis(200));

    let mut to_master = connect(master_port);
    to_master
        .write_frame(&command(&[b"SET", b"replicated-key", b"replicated-value"]))
        .unwrap();
    to_master.read_frame().unwrap();

    // Give propagation a moment to land before reading from the replica.
    thread::sleep(Duration::from_millis(100));

    let mut to_replica = connect(replica_port);
    to_replica
        .write_frame(&command(&[b"GET", b"replicated-key"]))
        .unwrap();
    let (reply, _) = to_replica.read_frame().unwrap();
    assert_eq!(reply, Resp::bulk(b"replicated-value".to_vec()));
}

#[test]
fn wait_fast_path_with_no_replicas_returns_zero() {
    let port = start_server(&["--port", "0"]);
    let mut conn = connect(port);
    conn.write_frame(&command(&[b"WAIT", b"0", b"100"]))
        .unwrap();
    let (reply, _) = conn.read_frame().unwrap();
    assert_eq!(reply, Resp::Integer(0));
}
