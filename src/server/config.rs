use clap::Parser;

use crate::logging::log_warn;

/// CLI surface for the server. `--replicaof` takes the Redis-style single
/// string `"<host> <port>"`; per the wire contract the host half is parsed
/// but never actually used (the replica always reaches its master on the
/// port half alone, following the codebase this was generalised from) —
/// preserved here rather than "fixed".
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(short, long, default_value_t = 6379)]
    port: u16,
    #[arg(short, long)]
    replicaof: Option<String>,
    #[arg(long)]
    dir: Option<String>,
    #[arg(long)]
    dbfilename: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Config::parse()
    }

    pub fn listening_port(&self) -> u16 {
        self.port
    }

    pub fn master_address(&self) -> Option<(String, u16)> {
        let address = self.replicaof.as_ref()?;
        match address.split_whitespace().collect::<Vec<_>>().as_slice() {
            [host, port] => match port.parse() {
                Ok(port) => Some((host.to_string(), port)),
                Err(_) => {
                    log_warn!("invalid --replicaof port {port:?}, starting as master instead");
                    None
                }
            },
            _ => {
                log_warn!("invalid --replicaof value {address:?}, expected \"<host> <port>\"");
                None
            }
        }
    }

    pub fn is_master(&self) -> bool {
        self.replicaof.is_none()
    }

    pub fn data_dir(&self) -> Option<&str> {
        self.dir.as_deref()
    }

    pub fn dbfilename(&self) -> Option<&str> {
        self.dbfilename.as_deref()
    }
}
