use std::time::{Duration, Instant};
use std::sync::Arc;

use crate::network::connection::{Connection, ConnectionError};
use crate::parser::command::{Command, ReplConfCommand};
use crate::parser::resp::Resp;
use crate::replication::rdb::{get_empty_rdb, serialize_rdb};
use crate::server::metadata::ReplicaInfo;

use super::data::Server;

const WAIT_TICK: Duration = Duration::from_millis(10);

/// Runs each parsed `Command` against shared server state and replies on
/// `conn` when the command calls for a reply. The same dispatcher drives
/// both ordinary client connections and, on a replica, the single
/// connection to its master — `is_master_link` distinguishes the latter,
/// since commands arriving on it never get a reply and always count
/// toward the replica's replication-offset.
pub struct CommandHandler<'a> {
    conn: &'a mut Connection,
    server: Arc<Server>,
    is_master_link: bool,
}

impl<'a> CommandHandler<'a> {
    pub fn new(conn: &'a mut Connection, server: Arc<Server>, is_master_link: bool) -> Self {
        CommandHandler {
            conn,
            server,
            is_master_link,
        }
    }

    /// Dispatches `command`, whose encoded wire form was `frame_len` bytes
    /// long — needed for replication-offset accounting.
    pub fn handle(&mut self, command: &Command, frame_len: u64) -> Result<(), ConnectionError> {
        match command {
            Command::Ping => self.handle_ping(frame_len),
            Command::Echo(data) => self.handle_echo(data),
            Command::Get(key) => self.handle_get(key),
            Command::Set { key, value, expiry } => self.handle_set(key, value, *expiry, frame_len),
            Command::Info(section) => self.handle_info(section),
            Command::ReplConf(sub) => self.handle_replconf(sub, frame_len),
            Command::Psync => self.handle_psync(),
            Command::Wait {
                num_replicas,
                timeout,
            } => self.handle_wait(*num_replicas, *timeout),
        }
    }

    fn handle_ping(&mut self, frame_len: u64) -> Result<(), ConnectionError> {
        if self.is_master_link {
            self.server.advance_slave_offset(frame_len);
            Ok(())
        } else {
            self.conn.write_frame(&Resp::simple("PONG"))
        }
    }

    fn handle_echo(&mut self, data: &[u8]) -> Result<(), ConnectionError> {
        self.conn.write_frame(&Resp::bulk(data.to_vec()))
    }

    fn handle_get(&mut self, key: &[u8]) -> Result<(), ConnectionError> {
        let response = match self.server.get(key) {
            Some(value) => Resp::bulk(value),
            None => Resp::nil(),
        };
        self.conn.write_frame(&response)
    }

    fn handle_set(
        &mut self,
        key: &[u8],
        value: &[u8],
        expiry: Option<Duration>,
        frame_len: u64,
    ) -> Result<(), ConnectionError> {
        self.server.set(key, value, expiry);

        if self.is_master_link {
            self.server.advance_slave_offset(frame_len);
            return Ok(());
        }

        if !self.server.metadata.replica_info.is_master() {
            // A client talking to a replica directly gets no reply, same as
            // a SET arriving over the master link; only a master answers.
            return Ok(());
        }

        let command = Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
            expiry,
        };
        let frame = command.to_resp().encode();
        self.server.propagate(&frame);
        self.server.advance_master_offset(frame.len() as u64);

        self.conn.write_frame(&Resp::simple("OK"))
    }

    fn handle_info(&mut self, section: &[u8]) -> Result<(), ConnectionError> {
        let offset = match &self.server.metadata.replica_info {
            ReplicaInfo::Master(_) => self.server.master_offset(),
            ReplicaInfo::Slave(_) => self.server.slave_offset(),
        };
        let body = match section {
            b"replication" => self.server.metadata.info_body(offset),
            other => format!("unsupported INFO section {:?}", other).into_bytes(),
        };
        self.conn.write_frame(&Resp::bulk(body))
    }

    fn handle_replconf(
        &mut self,
        sub: &ReplConfCommand,
        frame_len: u64,
    ) -> Result<(), ConnectionError> {
        match sub {
            ReplConfCommand::ListeningPort(_) | ReplConfCommand::Capa(_) => {
                self.conn.write_frame(&Resp::simple("OK"))
            }
            ReplConfCommand::Ack(_offset) => {
                self.server.bump_acks();
                Ok(())
            }
            ReplConfCommand::GetAck => {
                let offset_before = self.server.slave_offset();
                let ack = Command::ReplConf(ReplConfCommand::Ack(offset_before));
                self.conn.write_frame(&ack.to_resp())?;
                self.server.advance_slave_offset(frame_len);
                Ok(())
            }
        }
    }

    fn handle_psync(&mut self) -> Result<(), ConnectionError> {
        let offset = self.server.master_offset();
        let replid = match &self.server.metadata.replica_info {
            ReplicaInfo::Master(info) => info.replication_id.clone(),
            ReplicaInfo::Slave(_) => unreachable!("PSYNC is only ever handled by a master"),
        };
        self.conn
            .write_frame(&Resp::simple(format!("FULLRESYNC {replid} {offset}")))?;

        let snapshot = serialize_rdb(&get_empty_rdb());
        self.conn.write_raw(&snapshot)?;

        let addr = self.conn.peer_addr()?;
        let stream = self.conn.try_clone()?;
        self.server.attach_replica(addr, stream);
        Ok(())
    }

    fn handle_wait(&mut self, num_replicas: u64, timeout: Duration) -> Result<(), ConnectionError> {
        let master_offset = self.server.master_offset();
        if master_offset == 0 {
            let count = self.server.replica_count() as i64;
            return self.conn.write_frame(&Resp::Integer(count));
        }

        self.server.reset_acks();
        let getack = Command::ReplConf(ReplConfCommand::GetAck).to_resp().encode();
        self.server.propagate(&getack);
        self.server.advance_master_offset(getack.len() as u64);

        let deadline = Instant::now() + timeout;
        let acks = self.server.wait_for_acks(num_replicas, deadline, WAIT_TICK);
        self.conn.write_frame(&Resp::Integer(acks as i64))
    }
}
