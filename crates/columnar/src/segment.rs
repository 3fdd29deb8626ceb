//! Column segments
//!
//! A column is written as a stream of zcode elements. The stream is cut
//! into segments of at most `segment_thresh` bytes as it grows; cuts fall
//! at byte boundaries, so one element may straddle two segments and a
//! reader treats a column's segments as a single continuous stream.

use crate::io::{read_exact_at, write_all, ReadAt, WriteSink};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};
use zed_core::zcode::varint::{uvarint, MAX_VARINT_LEN};
use zed_core::zcode::{self, tag_length};
use zed_core::{coding, CancellationToken, Error, Result};

/// Location of one segment in the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Byte offset from the start of the object.
    pub offset: i64,
    /// Length in bytes.
    pub length: i64,
}

impl Segment {
    /// End offset, exclusive.
    pub fn end(&self) -> i64 {
        self.offset.saturating_add(self.length)
    }
}

/// Hands full column buffers to the sink and tracks the data section.
pub(crate) struct Spiller<S> {
    pub(crate) sink: S,
    pub(crate) offset: u64,
    pub(crate) segment_thresh: usize,
    /// Bytes appended to column buffers and not yet spilled.
    pub(crate) buffered: usize,
    pub(crate) segments: u64,
}

impl<S: WriteSink> Spiller<S> {
    pub(crate) fn new(sink: S, segment_thresh: usize) -> Self {
        Spiller {
            sink,
            offset: 0,
            segment_thresh,
            buffered: 0,
            segments: 0,
        }
    }

    fn spill(&mut self, chunk: &[u8]) -> Result<Segment> {
        write_all(&mut self.sink, chunk)?;
        let seg = Segment {
            offset: self.offset as i64,
            length: chunk.len() as i64,
        };
        self.offset += chunk.len() as u64;
        self.buffered -= chunk.len();
        self.segments += 1;
        trace!(target: "zed::columnar", offset = seg.offset, length = seg.length, "spilled segment");
        Ok(seg)
    }

    /// Write raw bytes outside any column (reassembly section, trailer).
    pub(crate) fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        write_all(&mut self.sink, buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }
}

/// The write side of one column.
#[derive(Debug, Default)]
pub(crate) struct SegmentStream {
    buf: Vec<u8>,
    segments: Vec<Segment>,
}

impl SegmentStream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one element.
    pub(crate) fn append<S: WriteSink>(
        &mut self,
        body: Option<&[u8]>,
        sp: &mut Spiller<S>,
    ) -> Result<()> {
        let before = self.buf.len();
        zcode::append(&mut self.buf, body);
        sp.buffered += self.buf.len() - before;
        if self.buf.len() >= sp.segment_thresh {
            self.spill_full(sp)?;
        }
        Ok(())
    }

    /// Append an unsigned integer element.
    pub(crate) fn append_uint<S: WriteSink>(&mut self, v: u64, sp: &mut Spiller<S>) -> Result<()> {
        self.append(Some(&coding::encode_uint(v)[..]), sp)
    }

    fn spill_full<S: WriteSink>(&mut self, sp: &mut Spiller<S>) -> Result<()> {
        let thresh = sp.segment_thresh;
        let mut start = 0;
        while self.buf.len() - start >= thresh {
            let seg = sp.spill(&self.buf[start..start + thresh])?;
            self.segments.push(seg);
            start += thresh;
        }
        self.buf.drain(..start);
        Ok(())
    }

    /// Spill whatever is buffered.
    pub(crate) fn flush<S: WriteSink>(&mut self, sp: &mut Spiller<S>) -> Result<()> {
        self.spill_full(sp)?;
        if !self.buf.is_empty() {
            let seg = sp.spill(&self.buf)?;
            self.segments.push(seg);
            self.buf.clear();
        }
        Ok(())
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// The read side of one column: its segments as a continuous stream.
pub(crate) struct SegmentReader {
    source: Arc<dyn ReadAt>,
    segments: Vec<Segment>,
    next: usize,
    buf: Bytes,
    pos: usize,
    cancel: CancellationToken,
}

impl SegmentReader {
    pub(crate) fn new(source: Arc<dyn ReadAt>, segments: Vec<Segment>, cancel: CancellationToken) -> Self {
        SegmentReader {
            source,
            segments,
            next: 0,
            buf: Bytes::new(),
            pos: 0,
            cancel,
        }
    }

    /// Make at least one byte available; false at end of column.
    fn fill(&mut self) -> Result<bool> {
        while self.pos >= self.buf.len() {
            let seg = match self.segments.get(self.next) {
                Some(s) => *s,
                None => return Ok(false),
            };
            zed_core::cancel::check(&self.cancel)?;
            let mut buf = vec![0u8; seg.length as usize];
            read_exact_at(self.source.as_ref(), seg.offset as u64, &mut buf)?;
            debug!(target: "zed::columnar", offset = seg.offset, length = seg.length, "read segment");
            self.buf = Bytes::from(buf);
            self.pos = 0;
            self.next += 1;
        }
        Ok(true)
    }

    /// Whether every element has been consumed.
    pub(crate) fn at_end(&mut self) -> Result<bool> {
        Ok(!self.fill()?)
    }

    fn byte(&mut self) -> Result<u8> {
        if !self.fill()? {
            return Err(Error::BadFormat("column ended mid-element".into()));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn uvarint(&mut self) -> Result<u64> {
        self.fill()?;
        if let Some((v, n)) = uvarint(&self.buf[self.pos..]) {
            self.pos += n;
            return Ok(v);
        }
        // Straddles a segment boundary, or is malformed.
        let mut tmp = [0u8; MAX_VARINT_LEN];
        let mut n = 0;
        while n < MAX_VARINT_LEN {
            tmp[n] = self.byte()?;
            n += 1;
            if tmp[n - 1] < 0x80 {
                break;
            }
        }
        uvarint(&tmp[..n])
            .map(|(v, _)| v)
            .ok_or_else(|| Error::BadFormat("column varint overflows".into()))
    }

    fn take(&mut self, n: usize) -> Result<Bytes> {
        if self.buf.len() - self.pos >= n {
            let out = self.buf.slice(self.pos..self.pos + n);
            self.pos += n;
            return Ok(out);
        }
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if !self.fill()? {
                return Err(Error::BadFormat("column ended mid-element".into()));
            }
            let k = (n - out.len()).min(self.buf.len() - self.pos);
            out.extend_from_slice(&self.buf[self.pos..self.pos + k]);
            self.pos += k;
        }
        Ok(Bytes::from(out))
    }

    /// Read the next element.
    pub(crate) fn element(&mut self) -> Result<Option<Bytes>> {
        let tag = self.uvarint()?;
        match tag_length(tag).map_err(|e| Error::BadFormat(e.to_string()))? {
            None => Ok(None),
            Some(len) => Ok(Some(self.take(len)?)),
        }
    }

    /// Read the next element as an unsigned integer.
    pub(crate) fn uint(&mut self) -> Result<u64> {
        match self.element()? {
            Some(b) => coding::decode_uint(&b),
            None => Err(Error::BadFormat("null in integer column".into())),
        }
    }
}
