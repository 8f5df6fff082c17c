//! Compiles a decoded RESP array-of-bulk-strings into a [`Command`], and
//! re-encodes commands the server itself needs to send (propagated writes,
//! handshake steps, `REPLCONF` traffic).

use std::str;
use std::time::Duration;

use super::resp::Resp;

pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("expected an array of bulk strings")]
    NotAnArray,
    #[error("expected a bulk string argument")]
    NotABulkString,
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("argument {0:?} is not valid")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplConfCommand {
    ListeningPort(u16),
    Capa(String),
    GetAck,
    Ack(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Echo(Vec<u8>),
    Get(Vec<u8>),
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        expiry: Option<Duration>,
    },
    Info(Vec<u8>),
    ReplConf(ReplConfCommand),
    Psync,
    Wait {
        num_replicas: u64,
        timeout: Duration,
    },
}

struct Args<'a> {
    items: std::slice::Iter<'a, Resp>,
}

impl<'a> Args<'a> {
    fn new(items: &'a [Resp]) -> Self {
        Args {
            items: items.iter(),
        }
    }

    fn next_bulk(&mut self, name: &'static str) -> Result<&'a [u8]> {
        self.items
            .next()
            .ok_or(CommandError::MissingArgument(name))?
            .as_bulk()
            .ok_or(CommandError::NotABulkString)
    }

    fn next_str(&mut self, name: &'static str) -> Result<&'a str> {
        str::from_utf8(self.next_bulk(name)?)
            .map_err(|_| CommandError::InvalidArgument(name.to_string()))
    }

    fn next_u64(&mut self, name: &'static str) -> Result<u64> {
        self.next_str(name)?
            .parse()
            .map_err(|_| CommandError::InvalidArgument(name.to_string()))
    }
}

impl Command {
    /// Parse a decoded RESP value (the array produced by the codec) into a command.
    pub fn from_resp(value: &Resp) -> Result<Command> {
        let Resp::Array(items) = value else {
            return Err(CommandError::NotAnArray);
        };
        let mut args = Args::new(items);
        let name = args.next_str("command")?.to_ascii_uppercase();

        match name.as_str() {
            "PING" => Ok(Command::Ping),
            "ECHO" => Ok(Command::Echo(args.next_bulk("message")?.to_vec())),
            "GET" => Ok(Command::Get(args.next_bulk("key")?.to_vec())),
            "SET" => Self::parse_set(args),
            "INFO" => Ok(Command::Info(args.next_bulk("section")?.to_vec())),
            "REPLCONF" => Self::parse_replconf(args),
            "PSYNC" => Ok(Command::Psync),
            "WAIT" => Ok(Command::Wait {
                num_replicas: args.next_u64("numreplicas")?,
                timeout: Duration::from_millis(args.next_u64("timeout")?),
            }),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    fn parse_set(mut args: Args) -> Result<Command> {
        let key = args.next_bulk("key")?.to_vec();
        let value = args.next_bulk("value")?.to_vec();

        let expiry = match args.next_str("px") {
            Ok(flag) if flag.eq_ignore_ascii_case("px") => {
                Some(Duration::from_millis(args.next_u64("milliseconds")?))
            }
            Ok(other) => return Err(CommandError::InvalidArgument(other.to_string())),
            Err(CommandError::MissingArgument(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(Command::Set { key, value, expiry })
    }

    fn parse_replconf(mut args: Args) -> Result<Command> {
        let subcommand = args.next_str("subcommand")?.to_ascii_lowercase();
        let replconf = match subcommand.as_str() {
            "listening-port" => ReplConfCommand::ListeningPort(
                args.next_str("port")?
                    .parse()
                    .map_err(|_| CommandError::InvalidArgument("port".to_string()))?,
            ),
            "capa" => ReplConfCommand::Capa(args.next_str("capability")?.to_string()),
            "getack" => ReplConfCommand::GetAck,
            "ack" => ReplConfCommand::Ack(args.next_u64("offset")?),
            other => return Err(CommandError::InvalidArgument(other.to_string())),
        };
        Ok(Command::ReplConf(replconf))
    }

    /// Re-encode this command as an array of bulk strings, the way it is sent
    /// over the wire (propagated to replicas, or emitted during the handshake).
    pub fn to_resp(&self) -> Resp {
        match self {
            Command::Ping => Resp::array_of_bulks([b"PING".to_vec()]),
            Command::Echo(data) => Resp::array_of_bulks([b"ECHO".to_vec(), data.clone()]),
            Command::Get(key) => Resp::array_of_bulks([b"GET".to_vec(), key.clone()]),
            Command::Set { key, value, expiry } => {
                let mut elems = vec![b"SET".to_vec(), key.clone(), value.clone()];
                if let Some(d) = expiry {
                    elems.push(b"PX".to_vec());
                    elems.push(d.as_millis().to_string().into_bytes());
                }
                Resp::array_of_bulks(elems)
            }
            Command::Info(section) => Resp::array_of_bulks([b"INFO".to_vec(), section.clone()]),
            Command::ReplConf(replconf) => match replconf {
                ReplConfCommand::ListeningPort(port) => Resp::array_of_bulks([
                    b"REPLCONF".to_vec(),
                    b"listening-port".to_vec(),
                    port.to_string().into_bytes(),
                ]),
                ReplConfCommand::Capa(capa) => Resp::array_of_bulks([
                    b"REPLCONF".to_vec(),
                    b"capa".to_vec(),
                    capa.clone().into_bytes(),
                ]),
                ReplConfCommand::GetAck => {
                    Resp::array_of_bulks([b"REPLCONF".to_vec(), b"GETACK".to_vec(), b"*".to_vec()])
                }
                ReplConfCommand::Ack(offset) => Resp::array_of_bulks([
                    b"REPLCONF".to_vec(),
                    b"ACK".to_vec(),
                    offset.to_string().into_bytes(),
                ]),
            },
            Command::Psync => {
                Resp::array_of_bulks([b"PSYNC".to_vec(), b"?".to_vec(), b"-1".to_vec()])
            }
            Command::Wait {
                num_replicas,
                timeout,
            } => Resp::array_of_bulks([
                b"WAIT".to_vec(),
                num_replicas.to_string().into_bytes(),
                timeout.as_millis().to_string().into_bytes(),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::resp::decode;

    fn parse(bytes: &[u8]) -> Command {
        let (value, _) = decode(bytes).unwrap();
        Command::from_resp(&value).unwrap()
    }

    #[test]
    fn parses_ping() {
        assert_eq!(parse(b"*1\r\n$4\r\nping\r\n"), Command::Ping);
    }

    #[test]
    fn parses_echo() {
        assert_eq!(
            parse(b"*2\r\n$4\r\necho\r\n$4\r\ndata\r\n"),
            Command::Echo(b"data".to_vec())
        );
    }

    #[test]
    fn parses_get() {
        assert_eq!(
            parse(b"*2\r\n$3\r\nget\r\n$3\r\nkey\r\n"),
            Command::Get(b"key".to_vec())
        );
    }

    #[test]
    fn parses_set_without_expiry() {
        assert_eq!(
            parse(b"*3\r\n$3\r\nset\r\n$5\r\nfruit\r\n$5\r\napple\r\n"),
            Command::Set {
                key: b"fruit".to_vec(),
                value: b"apple".to_vec(),
                expiry: None,
            }
        );
    }

    #[test]
    fn parses_set_with_px_expiry() {
        assert_eq!(
            parse(b"*5\r\n$3\r\nset\r\n$5\r\nfruit\r\n$5\r\napple\r\n$2\r\npx\r\n$5\r\n65536\r\n"),
            Command::Set {
                key: b"fruit".to_vec(),
                value: b"apple".to_vec(),
                expiry: Some(Duration::from_millis(65536)),
            }
        );
    }

    #[test]
    fn rejects_set_with_bad_ttl() {
        let (value, _) =
            decode(b"*5\r\n$3\r\nset\r\n$5\r\nfruit\r\n$5\r\napple\r\n$2\r\npx\r\n$3\r\nabc\r\n")
                .unwrap();
        assert!(Command::from_resp(&value).is_err());
    }

    #[test]
    fn parses_replconf_ack() {
        assert_eq!(
            parse(b"*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$2\r\n31\r\n"),
            Command::ReplConf(ReplConfCommand::Ack(31))
        );
    }

    #[test]
    fn parses_replconf_getack() {
        assert_eq!(
            parse(b"*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n"),
            Command::ReplConf(ReplConfCommand::GetAck)
        );
    }

    #[test]
    fn parses_wait() {
        assert_eq!(
            parse(b"*3\r\n$4\r\nWAIT\r\n$1\r\n1\r\n$3\r\n500\r\n"),
            Command::Wait {
                num_replicas: 1,
                timeout: Duration::from_millis(500),
            }
        );
    }

    #[test]
    fn set_without_px_encodes_to_31_bytes() {
        let cmd = Command::Set {
            key: b"foo".to_vec(),
            value: b"bar".to_vec(),
            expiry: None,
        };
        assert_eq!(cmd.to_resp().encode().len(), 31);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let (value, _) = decode(b"*1\r\n$4\r\nNOPE\r\n").unwrap();
        assert_eq!(
            Command::from_resp(&value),
            Err(CommandError::Unknown("NOPE".to_string()))
        );
    }
}
