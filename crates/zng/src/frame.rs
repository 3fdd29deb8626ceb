//! Frame layout
//!
//! ```text
//! +---------+----------------+-------------------+
//! | code u8 | uvarint length | payload (length)  |
//! +---------+----------------+-------------------+
//! ```

use byteorder::ReadBytesExt;
use std::io::{self, Read};
use zed_core::zcode::varint::MAX_VARINT_LEN;
use zed_core::zcode::{append_uvarint, uvarint};
use zed_core::{Error, Result};

/// Default size at which a writer flushes its pending values frame.
pub const DEFAULT_FRAME_THRESHOLD: usize = 512 * 1024;

/// Largest frame payload a reader accepts.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Kind of a frame, by its leading code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Canonical type-values defining the next local type IDs.
    Types = 0,
    /// `uvarint(local type id) ++ element` pairs.
    Values = 1,
    /// `uvarint(encoding) ++ bytes`.
    Control = 2,
    /// Empty; resets local type IDs.
    EndOfStream = 3,
}

impl FrameKind {
    /// The code byte.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a code byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FrameKind::Types),
            1 => Some(FrameKind::Values),
            2 => Some(FrameKind::Control),
            3 => Some(FrameKind::EndOfStream),
            _ => None,
        }
    }
}

/// Append a complete frame to `dst`.
pub fn append_frame(dst: &mut Vec<u8>, kind: FrameKind, payload: &[u8]) {
    dst.push(kind.code());
    append_uvarint(dst, payload.len() as u64);
    dst.extend_from_slice(payload);
}

/// Read a frame header. Returns `None` on a clean end of input.
pub fn read_header<R: Read>(r: &mut R, max_len: usize) -> Result<Option<(FrameKind, usize)>> {
    let code = match r.read_u8() {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let kind = FrameKind::from_code(code)
        .ok_or_else(|| Error::BadFormat(format!("unknown frame code {code}")))?;
    let len = read_uvarint(r)?;
    if len > max_len as u64 {
        return Err(Error::BadFormat(format!(
            "frame length {len} exceeds limit {max_len}"
        )));
    }
    Ok(Some((kind, len as usize)))
}

/// Collect one varint's bytes from `r`, then decode with the shared codec.
fn read_uvarint<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut n = 0;
    while n < MAX_VARINT_LEN {
        buf[n] = r.read_u8().map_err(truncated)?;
        n += 1;
        if buf[n - 1] < 0x80 {
            break;
        }
    }
    uvarint(&buf[..n])
        .map(|(v, _)| v)
        .ok_or_else(|| Error::BadFormat("frame length varint overflows".into()))
}

/// Map an unexpected EOF inside a frame to `BadFormat`.
pub(crate) fn truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::BadFormat("truncated frame".into())
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let mut buf = Vec::new();
        append_frame(&mut buf, FrameKind::Control, &[9; 300]);
        let mut r = &buf[..];
        let (kind, len) = read_header(&mut r, MAX_FRAME_LEN).unwrap().unwrap();
        assert_eq!(kind, FrameKind::Control);
        assert_eq!(len, 300);
        assert_eq!(r.len(), 300);
    }

    #[test]
    fn test_clean_eof() {
        let mut r: &[u8] = &[];
        assert!(read_header(&mut r, MAX_FRAME_LEN).unwrap().is_none());
    }

    #[test]
    fn test_rejects_unknown_code_and_oversize() {
        let mut r: &[u8] = &[7, 0];
        assert!(matches!(read_header(&mut r, MAX_FRAME_LEN), Err(Error::BadFormat(_))));

        let mut buf = Vec::new();
        buf.push(1);
        append_uvarint(&mut buf, 1025);
        let mut r = &buf[..];
        assert!(matches!(read_header(&mut r, 1024), Err(Error::BadFormat(_))));
    }

    #[test]
    fn test_overlong_length() {
        let mut buf = vec![1u8];
        buf.extend_from_slice(&[0xff; 11]);
        let mut r = &buf[..];
        assert!(matches!(read_header(&mut r, MAX_FRAME_LEN), Err(Error::BadFormat(_))));
    }

    #[test]
    fn test_truncated_length() {
        let mut r: &[u8] = &[1, 0x80];
        assert!(matches!(read_header(&mut r, MAX_FRAME_LEN), Err(Error::BadFormat(_))));
    }
}
