//! The zcode byte language.
//!
//! A container body is a concatenation of elements; each element is
//! `tag_and_length ++ payload`:
//!
//! ```text
//! +----------------------+-----------------+
//! | uvarint tag          | payload bytes   |
//! +----------------------+-----------------+
//!   present: len << 1      len bytes
//!   null:    1             (none)
//! ```
//!
//! A primitive value is simply its bytes. Container values (records,
//! arrays, sets, maps, unions) are bodies of elements.

mod builder;
mod iter;
mod normalize;
pub mod varint;

pub use builder::Builder;
pub use iter::Iter;
pub use normalize::{normalize_map, normalize_set};
pub use varint::{append_uvarint, uvarint, uvarint_len};

use crate::error::{Error, Result};

/// Tag of a null element.
pub const TAG_NULL: u64 = 1;

/// Tag of a present element with a payload of `len` bytes.
#[inline]
pub fn to_tag(len: usize) -> u64 {
    (len as u64) << 1
}

/// Payload length carried by a tag, or `None` for a null tag.
///
/// Returns `BadValue` for a tag with the null bit set and a nonzero length.
#[inline]
pub fn tag_length(tag: u64) -> Result<Option<usize>> {
    if tag & 1 == 1 {
        if tag != TAG_NULL {
            return Err(Error::BadValue(format!("null tag with length {}", tag >> 1)));
        }
        return Ok(None);
    }
    usize::try_from(tag >> 1)
        .map(Some)
        .map_err(|_| Error::BadValue(format!("element length {} overflows", tag >> 1)))
}

/// Append one element to `dst`.
pub fn append(dst: &mut Vec<u8>, body: Option<&[u8]>) {
    match body {
        None => append_uvarint(dst, TAG_NULL),
        Some(b) => {
            append_uvarint(dst, to_tag(b.len()));
            dst.extend_from_slice(b);
        }
    }
}

/// Size in bytes of the element `append` writes for `body`.
pub fn element_len(body: Option<&[u8]>) -> usize {
    match body {
        None => uvarint_len(TAG_NULL),
        Some(b) => uvarint_len(to_tag(b.len())) + b.len(),
    }
}

/// Decode the element at the front of `buf`.
///
/// Returns the element's payload (or `None` for null) and the total number
/// of bytes the element occupies, tag included.
pub fn read_element(buf: &[u8]) -> Result<(Option<&[u8]>, usize)> {
    let (tag, n) = uvarint(buf).ok_or_else(|| Error::BadValue("bad element tag".into()))?;
    match tag_length(tag)? {
        None => Ok((None, n)),
        Some(len) => {
            let end = n
                .checked_add(len)
                .filter(|&end| end <= buf.len())
                .ok_or_else(|| {
                    Error::BadValue(format!(
                        "element length {} exceeds remaining {} bytes",
                        len,
                        buf.len() - n
                    ))
                })?;
            Ok((Some(&buf[n..end]), end))
        }
    }
}

/// Encode a single element as a standalone byte vector.
pub fn encode_element(body: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(element_len(body));
    append(&mut out, body);
    out
}
