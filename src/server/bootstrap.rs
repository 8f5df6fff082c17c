use std::net::TcpListener;
use std::sync::Arc;

use crate::logging::{log_error, log_info, log_warn};
use crate::network::connection::{Connection, ConnectionError};
use crate::parser::command::Command;
use crate::replication::handshake;
use crate::server::metadata::ReplicaInfo;

use super::config::Config;
use super::data::Server;
use super::handler::CommandHandler;
use super::metadata::ServerMetadata;

/// Parses the CLI config, builds the shared server state, starts replication
/// if configured as a replica, and serves connections until the process exits.
pub fn run(config: Config) -> anyhow::Result<()> {
    let (listener, server) = bind(config)?;
    serve(listener, server);
    Ok(())
}

/// Builds the shared server state and binds its listening socket, without
/// yet entering the accept loop. Split out from [`run`] so a test harness can
/// bind an ephemeral port, read back the address `TcpListener::bind` chose,
/// and only then hand the listener to [`serve`].
pub fn bind(config: Config) -> anyhow::Result<(TcpListener, Arc<Server>)> {
    let metadata = ServerMetadata::generate(&config);
    let listening_port = metadata.listening_port;
    let server = Arc::new(Server::new(metadata));

    if let ReplicaInfo::Slave(info) = &server.metadata.replica_info {
        let master_host = info.master_host.clone();
        let master_port = info.master_port;
        let server = server.clone();
        std::thread::spawn(move || {
            run_replication_link(&master_host, master_port, listening_port, server)
        });
    }

    let listener = TcpListener::bind(("0.0.0.0", listening_port))?;
    log_info!("listening on 0.0.0.0:{listening_port}");
    Ok((listener, server))
}

/// Accepts connections from `listener` forever, dispatching each on its own thread.
pub fn serve(listener: TcpListener, server: Arc<Server>) {
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let server = server.clone();
                std::thread::spawn(move || {
                    let conn = Connection::new(stream);
                    run_dispatcher(conn, server, false);
                });
            }
            Err(e) => log_warn!("failed to accept a connection: {e}"),
        }
    }
}

/// Dials the master, runs the handshake, and then keeps dispatching the
/// replicated command stream on the same connection. A failed handshake is
/// fatal, matching a real replica refusing to run against state it cannot
/// trust.
fn run_replication_link(master_host: &str, master_port: u16, replica_port: u16, server: Arc<Server>) {
    log_info!("connecting to master {master_host}:{master_port}");
    match handshake::perform(master_host, master_port, replica_port) {
        Ok(outcome) => {
            log_info!("handshake with master complete, {} byte snapshot received", outcome.rdb.len());
            run_dispatcher(outcome.connection, server, true);
            log_error!("connection to master {master_host}:{master_port} lost");
            std::process::exit(1);
        }
        Err(e) => {
            log_error!("handshake with master {master_host}:{master_port} failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Reads frames off `conn` and dispatches each as a `Command` until the peer
/// disconnects or a protocol error occurs.
fn run_dispatcher(mut conn: Connection, server: Arc<Server>, is_master_link: bool) {
    loop {
        let (value, len) = match conn.read_frame() {
            Ok(pair) => pair,
            Err(ConnectionError::Eof) => break,
            Err(e) => {
                log_warn!("connection error: {e}");
                break;
            }
        };

        let command = match Command::from_resp(&value) {
            Ok(command) => command,
            Err(e) => {
                log_warn!("failed to parse command: {e}");
                break;
            }
        };

        let mut handler = CommandHandler::new(&mut conn, server.clone(), is_master_link);
        if let Err(e) = handler.handle(&command, len as u64) {
            log_warn!("error handling command: {e}");
            break;
        }
    }

    if !is_master_link {
        if let Ok(addr) = conn.peer_addr() {
            server.detach_replica(addr);
        }
    }
}
