//! Decoder for the out-of-band snapshot frame that follows a master's
//! `+FULLRESYNC` reply: `$<len>\r\n<bytes>` with **no** trailing CRLF. This is
//! not a bulk string and must not be run through `parser::resp::decode`.

use super::resp::{find_crlf, FrameError, Result};

pub struct SnapshotFrame {
    pub payload: Vec<u8>,
    pub len: usize,
}

pub fn decode_snapshot(buf: &[u8]) -> Result<SnapshotFrame> {
    if buf.first() != Some(&b'$') {
        return Err(FrameError::InvalidTag(*buf.first().unwrap_or(&0)));
    }

    let line_end = find_crlf(buf).ok_or(FrameError::Incomplete)?;
    let n: usize = std::str::from_utf8(&buf[1..line_end])?
        .parse()
        .map_err(|_| FrameError::InvalidLength)?;

    let payload_start = line_end + 2;
    let payload_end = payload_start + n;
    if payload_end > buf.len() {
        return Err(FrameError::Incomplete);
    }

    Ok(SnapshotFrame {
        payload: buf[payload_start..payload_end].to_vec(),
        len: payload_end,
    })
}
