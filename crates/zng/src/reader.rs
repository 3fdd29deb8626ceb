//! ZNG stream reader.

use crate::frame::{read_header, truncated, FrameKind, MAX_FRAME_LEN};
use bytes::Bytes;
use std::io::Read;
use std::sync::Arc;
use tracing::trace;
use zed_core::types::ID_FIRST_COMPLEX;
use zed_core::zcode::{read_element, uvarint};
use zed_core::{Context, Error, PrimitiveType, Result, Type, Value, ValueReader};

/// A control message carried in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Application-defined encoding of `bytes`.
    pub encoding: u64,
    /// The message.
    pub bytes: Bytes,
}

/// Reads values from a ZNG frame stream.
///
/// Types defined in the stream are interned in the reader's context. Value
/// bodies are sliced out of the frame buffer without copying.
pub struct Reader<R: Read> {
    input: R,
    ctx: Arc<Context>,
    max_frame: usize,
    local: Vec<Type>,
    frame: Bytes,
    pos: usize,
}

impl<R: Read> Reader<R> {
    /// Read from `input`, interning types in `ctx`.
    pub fn new(ctx: Arc<Context>, input: R) -> Self {
        Reader {
            input,
            ctx,
            max_frame: MAX_FRAME_LEN,
            local: Vec::new(),
            frame: Bytes::new(),
            pos: 0,
        }
    }

    /// Reject frames larger than `max` bytes.
    pub fn with_max_frame(mut self, max: usize) -> Self {
        self.max_frame = max;
        self
    }

    /// The context types are interned in.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Read the next value, skipping control messages.
    pub fn read_value(&mut self) -> Result<Option<Value>> {
        loop {
            match self.read_payload()? {
                (Some(v), _) => return Ok(Some(v)),
                (None, Some(_)) => continue,
                (None, None) => return Ok(None),
            }
        }
    }

    /// Read the next value or control message; `(None, None)` at end of
    /// input.
    pub fn read_payload(&mut self) -> Result<(Option<Value>, Option<Control>)> {
        loop {
            if self.pos < self.frame.len() {
                return Ok((Some(self.next_value()?), None));
            }
            let (kind, payload) = match self.next_frame()? {
                Some(f) => f,
                None => return Ok((None, None)),
            };
            match kind {
                FrameKind::Types => self.define_types(&payload)?,
                FrameKind::Values => {
                    self.frame = payload;
                    self.pos = 0;
                }
                FrameKind::Control => {
                    let (encoding, n) = uvarint(&payload)
                        .ok_or_else(|| Error::BadFormat("bad control encoding".into()))?;
                    let control = Control {
                        encoding,
                        bytes: payload.slice(n..),
                    };
                    return Ok((None, Some(control)));
                }
                FrameKind::EndOfStream => self.local.clear(),
            }
        }
    }

    fn next_frame(&mut self) -> Result<Option<(FrameKind, Bytes)>> {
        let (kind, len) = match read_header(&mut self.input, self.max_frame)? {
            Some(h) => h,
            None => return Ok(None),
        };
        let mut payload = vec![0u8; len];
        self.input.read_exact(&mut payload).map_err(truncated)?;
        trace!(target: "zed::zng", ?kind, len, "frame");
        Ok(Some((kind, Bytes::from(payload))))
    }

    fn define_types(&mut self, mut payload: &[u8]) -> Result<()> {
        while !payload.is_empty() {
            let (typ, rest) = self.ctx.decode_type_value(payload)?;
            self.local.push(typ);
            payload = rest;
        }
        Ok(())
    }

    fn lookup(&self, id: u64) -> Result<Type> {
        if id < u64::from(ID_FIRST_COMPLEX) {
            return PrimitiveType::from_id(id as u8)
                .map(Type::Primitive)
                .ok_or_else(|| Error::BadFormat(format!("bad primitive type id {id}")));
        }
        self.local
            .get((id - u64::from(ID_FIRST_COMPLEX)) as usize)
            .cloned()
            .ok_or_else(|| Error::BadFormat(format!("undefined local type id {id}")))
    }

    fn next_value(&mut self) -> Result<Value> {
        let rest = &self.frame[self.pos..];
        let (id, n) =
            uvarint(rest).ok_or_else(|| Error::BadFormat("bad value type id".into()))?;
        let typ = self.lookup(id)?;
        let (body, len) = read_element(&rest[n..]).map_err(|e| match e {
            Error::BadValue(msg) => Error::BadFormat(msg),
            other => other,
        })?;
        let start = self.pos + n;
        let body = body.map(|b| {
            let off = start + (len - b.len());
            self.frame.slice(off..off + b.len())
        });
        self.pos = start + len;
        Ok(Value::new(typ, body))
    }
}

impl<R: Read> ValueReader for Reader<R> {
    fn read(&mut self) -> Result<Option<Value>> {
        self.read_value()
    }
}

/// Decode every value of a complete in-memory stream.
///
/// Fails on any partial frame, so trailing garbage is an error.
pub fn decode_all(ctx: Arc<Context>, buf: &[u8]) -> Result<Vec<Value>> {
    let mut r = Reader::new(ctx, buf);
    let mut out = Vec::new();
    while let Some(v) = r.read_value()? {
        out.push(v);
    }
    Ok(out)
}
