use super::config::Config;
use crate::logging::log_info;

/// Master replication-id. A real Redis generates this randomly per boot; a
/// fixed literal is enough for a core that never does partial resync.
pub const REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

#[derive(Debug)]
pub struct MasterInfo {
    pub replication_id: String,
}

#[derive(Debug)]
pub struct SlaveInfo {
    pub master_host: String,
    pub master_port: u16,
}

#[derive(Debug)]
pub enum ReplicaInfo {
    Master(MasterInfo),
    Slave(SlaveInfo),
}

impl ReplicaInfo {
    pub fn is_master(&self) -> bool {
        matches!(self, ReplicaInfo::Master(_))
    }
}

#[derive(Debug)]
pub struct RdbConfig {
    pub dir: String,
    pub dbfilename: String,
}

#[derive(Debug)]
pub struct ServerMetadata {
    pub listening_port: u16,
    pub replica_info: ReplicaInfo,
    /// Accepted so a test harness invoking this binary with `--dir`/`--dbfilename`
    /// doesn't fail on an unknown flag; on-disk persistence is out of scope.
    pub rdb_config: Option<RdbConfig>,
}

impl ServerMetadata {
    pub fn generate(config: &Config) -> Self {
        let replica_info = match config.master_address() {
            Some((master_host, master_port)) => {
                log_info!("starting as replica of {master_host}:{master_port}");
                ReplicaInfo::Slave(SlaveInfo {
                    master_host,
                    master_port,
                })
            }
            None => {
                log_info!("starting as master");
                ReplicaInfo::Master(MasterInfo {
                    replication_id: REPLICATION_ID.to_string(),
                })
            }
        };
        let rdb_config = match (config.data_dir(), config.dbfilename()) {
            (Some(dir), Some(dbfilename)) => Some(RdbConfig {
                dir: dir.to_string(),
                dbfilename: dbfilename.to_string(),
            }),
            _ => None,
        };
        ServerMetadata {
            listening_port: config.listening_port(),
            replica_info,
            rdb_config,
        }
    }

    /// Body of the `INFO replication` reply: three `\n`-joined lines, the
    /// replid left blank for a replica.
    pub fn info_body(&self, repl_offset: u64) -> Vec<u8> {
        let (role, replid) = match &self.replica_info {
            ReplicaInfo::Master(info) => ("master", info.replication_id.as_str()),
            ReplicaInfo::Slave(_) => ("slave", ""),
        };
        format!("role:{role}\nmaster_replid:{replid}\nmaster_repl_offset:{repl_offset}")
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_info_body_includes_replid_and_offset() {
        let metadata = ServerMetadata {
            listening_port: 6379,
            replica_info: ReplicaInfo::Master(MasterInfo {
                replication_id: REPLICATION_ID.to_string(),
            }),
            rdb_config: None,
        };
        let body = String::from_utf8(metadata.info_body(42)).unwrap();
        assert_eq!(
            body,
            format!("role:master\nmaster_replid:{REPLICATION_ID}\nmaster_repl_offset:42")
        );
    }

    #[test]
    fn slave_info_body_has_blank_replid() {
        let metadata = ServerMetadata {
            listening_port: 6380,
            replica_info: ReplicaInfo::Slave(SlaveInfo {
                master_host: "localhost".to_string(),
                master_port: 6379,
            }),
            rdb_config: None,
        };
        let body = String::from_utf8(metadata.info_body(7)).unwrap();
        assert_eq!(body, "role:slave\nmaster_replid:\nmaster_repl_offset:7");
    }
}
