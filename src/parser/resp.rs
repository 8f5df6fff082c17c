//! RESP (REdis Serialization Protocol) framing: decode a single value out of a
//! buffered byte slice, and encode values back to wire bytes.

use std::str;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const CRLF: &str = "\r\n";

pub type Result<T> = std::result::Result<T, FrameError>;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not a bug: the buffer doesn't yet hold a full frame. Callers read more
    /// bytes from the socket and retry the same decode call.
    #[error("need more data to decode a complete frame")]
    Incomplete,
    #[error("unsupported RESP tag byte {0:#04x}")]
    InvalidTag(u8),
    #[error("malformed or out-of-range length prefix")]
    InvalidLength,
    #[error("non-utf8 payload where text was expected")]
    InvalidUtf8(#[from] str::Utf8Error),
}

impl FrameError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Incomplete)
    }
}

/// A single RESP value. `Bulk(None)` is the distinguished nil-bulk (`$-1\r\n`),
/// distinct from `Bulk(Some(vec![]))` (an empty bulk string, `$0\r\n\r\n`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resp {
    Simple(String),
    Bulk(Option<Vec<u8>>),
    Integer(i64),
    Array(Vec<Resp>),
}

impl Resp {
    pub fn bulk(data: impl Into<Vec<u8>>) -> Resp {
        Resp::Bulk(Some(data.into()))
    }

    pub fn nil() -> Resp {
        Resp::Bulk(None)
    }

    pub fn simple(text: impl Into<String>) -> Resp {
        Resp::Simple(text.into())
    }

    pub fn array_of_bulks<I, T>(items: I) -> Resp
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        Resp::Array(items.into_iter().map(Resp::bulk).collect())
    }

    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Resp::Bulk(Some(data)) => Some(data),
            _ => None,
        }
    }

    pub fn as_simple(&self) -> Option<&str> {
        match self {
            Resp::Simple(data) => Some(data),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Resp::Simple(text) => format!("+{text}{CRLF}").into_bytes(),
            Resp::Bulk(None) => format!("$-1{CRLF}").into_bytes(),
            Resp::Bulk(Some(data)) => {
                let mut out = format!("${}{CRLF}", data.len()).into_bytes();
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF.as_bytes());
                out
            }
            Resp::Integer(n) => format!(":{n}{CRLF}").into_bytes(),
            Resp::Array(items) => {
                let mut out = format!("*{}{CRLF}", items.len()).into_bytes();
                for item in items {
                    out.extend_from_slice(&item.encode());
                }
                out
            }
        }
    }
}

pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == [CR, LF])
}

fn parse_i64(line: &[u8]) -> Result<i64> {
    str::from_utf8(line)?
        .parse::<i64>()
        .map_err(|_| FrameError::InvalidLength)
}

fn read_line(buf: &[u8]) -> Result<(&[u8], usize)> {
    let end = find_crlf(buf).ok_or(FrameError::Incomplete)?;
    Ok((&buf[..end], end + 2))
}

fn decode_simple(buf: &[u8]) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&buf[1..])?;
    Ok((Resp::Simple(str::from_utf8(line)?.to_owned()), 1 + consumed))
}

fn decode_integer(buf: &[u8]) -> Result<(Resp, usize)> {
    let (line, consumed) = read_line(&buf[1..])?;
    Ok((Resp::Integer(parse_i64(line)?), 1 + consumed))
}

fn decode_bulk(buf: &[u8]) -> Result<(Resp, usize)> {
    let (line, line_len) = read_line(&buf[1..])?;
    let n = parse_i64(line)?;
    let header_len = 1 + line_len;

    if n == -1 {
        return Ok((Resp::Bulk(None), header_len));
    }
    if n < 0 {
        return Err(FrameError::InvalidLength);
    }
    let n = n as usize;

    let data_end = header_len + n;
    if data_end + 2 > buf.len() {
        return Err(FrameError::Incomplete);
    }
    if buf[data_end] != CR || buf[data_end + 1] != LF {
        return Err(FrameError::InvalidLength);
    }

    let data = buf[header_len..data_end].to_vec();
    Ok((Resp::Bulk(Some(data)), data_end + 2))
}

fn decode_array(buf: &[u8]) -> Result<(Resp, usize)> {
    let (line, line_len) = read_line(&buf[1..])?;
    let n = parse_i64(line)?;
    if n < 0 {
        return Err(FrameError::InvalidLength);
    }
    let n = n as usize;

    let mut offset = 1 + line_len;
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        let (item, len) = decode(&buf[offset..])?;
        items.push(item);
        offset += len;
    }

    Ok((Resp::Array(items), offset))
}

/// Decode exactly one RESP value from the front of `buf`.
///
/// Returns the value and the number of bytes it consumed. `FrameError::Incomplete`
/// means `buf` holds a prefix of a valid frame; the caller should read more bytes
/// from its source and call `decode` again from the start of the same buffer.
pub fn decode(buf: &[u8]) -> Result<(Resp, usize)> {
    match buf.first() {
        Some(b'+') => decode_simple(buf),
        Some(b':') => decode_integer(buf),
        Some(b'$') => decode_bulk(buf),
        Some(b'*') => decode_array(buf),
        Some(&byte) => Err(FrameError::InvalidTag(byte)),
        None => Err(FrameError::Incomplete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string_round_trips() {
        let resp = Resp::simple("PONG");
        let encoded = resp.encode();
        assert_eq!(encoded, b"+PONG\r\n");
        let (decoded, len) = decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(len, encoded.len());
    }

    #[test]
    fn bulk_string_round_trips_binary_safe_payload() {
        let payload = vec![b'\r', b'\n', 0, b'a'];
        let resp = Resp::bulk(payload.clone());
        let encoded = resp.encode();
        let (decoded, len) = decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(len, encoded.len());
        assert_eq!(decoded.as_bulk(), Some(payload.as_slice()));
    }

    #[test]
    fn integer_round_trips() {
        let resp = Resp::Integer(-42);
        let encoded = resp.encode();
        assert_eq!(encoded, b":-42\r\n");
        let (decoded, _) = decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn array_round_trips_nested() {
        let resp = Resp::Array(vec![
            Resp::array_of_bulks([b"GET".to_vec(), b"fruit".to_vec()]),
            Resp::bulk("apple"),
        ]);
        let encoded = resp.encode();
        let (decoded, len) = decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(len, encoded.len());
    }

    #[test]
    fn nil_bulk_is_distinct_from_empty_bulk() {
        let (nil, _) = decode(b"$-1\r\n").unwrap();
        let (empty, _) = decode(b"$0\r\n\r\n").unwrap();
        assert_eq!(nil, Resp::nil());
        assert_eq!(empty, Resp::bulk(Vec::new()));
        assert_ne!(nil, empty);
    }

    #[test]
    fn truncated_bulk_string_is_incomplete() {
        let err = decode(b"$5\r\nhel").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn truncated_array_is_incomplete() {
        let err = decode(b"*2\r\n$4\r\nPING\r\n").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn unknown_tag_is_invalid() {
        let err = decode(b"-ERR oops\r\n").unwrap_err();
        assert!(matches!(err, FrameError::InvalidTag(b'-')));
    }

    #[test]
    fn offset_accounting_example_is_31_bytes() {
        let resp = Resp::array_of_bulks([b"SET".to_vec(), b"foo".to_vec(), b"bar".to_vec()]);
        assert_eq!(resp.encode().len(), 31);
    }
}
