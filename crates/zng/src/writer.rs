//! ZNG stream writer.

use crate::frame::{append_frame, FrameKind, DEFAULT_FRAME_THRESHOLD};
use rustc_hash::FxHashMap;
use std::io::Write;
use tracing::trace;
use zed_core::types::ID_FIRST_COMPLEX;
use zed_core::zcode::{self, append_uvarint};
use zed_core::{encode_type_value, Result, Type, Value, ValueWriter};

/// Writes values as a ZNG frame stream.
///
/// Values accumulate in a pending values frame that is flushed once it
/// reaches the frame threshold. Complex types are assigned local IDs on
/// first use and defined in a types frame written just before the values
/// frame that needs them.
pub struct Writer<W: Write> {
    out: W,
    threshold: usize,
    local: FxHashMap<Type, u32>,
    next_id: u32,
    types: Vec<u8>,
    values: Vec<u8>,
    frame: Vec<u8>,
}

impl<W: Write> Writer<W> {
    /// Write to `out` with the default frame threshold.
    pub fn new(out: W) -> Self {
        Self::with_threshold(out, DEFAULT_FRAME_THRESHOLD)
    }

    /// Write to `out`, flushing values frames at `threshold` bytes.
    pub fn with_threshold(out: W, threshold: usize) -> Self {
        Writer {
            out,
            threshold: threshold.max(1),
            local: FxHashMap::default(),
            next_id: ID_FIRST_COMPLEX,
            types: Vec::new(),
            values: Vec::new(),
            frame: Vec::new(),
        }
    }

    fn local_id(&mut self, typ: &Type) -> u32 {
        if let Type::Primitive(p) = typ {
            return u32::from(p.id());
        }
        if let Some(&id) = self.local.get(typ) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.types.extend_from_slice(&encode_type_value(typ));
        self.local.insert(typ.clone(), id);
        id
    }

    /// Append one value.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        let id = self.local_id(value.typ());
        append_uvarint(&mut self.values, u64::from(id));
        zcode::append(&mut self.values, value.bytes());
        if self.values.len() >= self.threshold {
            self.flush_frames()?;
        }
        Ok(())
    }

    /// Write a control message after any pending values.
    pub fn write_control(&mut self, encoding: u64, bytes: &[u8]) -> Result<()> {
        self.flush_frames()?;
        let mut payload = Vec::with_capacity(bytes.len() + 2);
        append_uvarint(&mut payload, encoding);
        payload.extend_from_slice(bytes);
        self.emit(FrameKind::Control, &payload)
    }

    /// End the current stream. Local type IDs restart for the next one.
    pub fn end_stream(&mut self) -> Result<()> {
        self.flush_frames()?;
        self.emit(FrameKind::EndOfStream, &[])?;
        self.local.clear();
        self.next_id = ID_FIRST_COMPLEX;
        Ok(())
    }

    /// Write pending frames and flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_frames()?;
        self.out.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.out)
    }

    /// Bytes of values not yet written out.
    pub fn pending(&self) -> usize {
        self.values.len()
    }

    fn flush_frames(&mut self) -> Result<()> {
        if !self.types.is_empty() {
            let types = std::mem::take(&mut self.types);
            self.emit(FrameKind::Types, &types)?;
        }
        if !self.values.is_empty() {
            let values = std::mem::take(&mut self.values);
            self.emit(FrameKind::Values, &values)?;
            self.values = values;
            self.values.clear();
        }
        Ok(())
    }

    fn emit(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        self.frame.clear();
        append_frame(&mut self.frame, kind, payload);
        trace!(target: "zed::zng", ?kind, len = payload.len(), "frame");
        self.out.write_all(&self.frame)?;
        Ok(())
    }
}

impl<W: Write> ValueWriter for Writer<W> {
    fn write(&mut self, value: &Value) -> Result<()> {
        self.write_value(value)
    }
}

/// Encode `values` as one complete stream ending in end-of-stream.
pub fn encode_all<'a>(values: impl IntoIterator<Item = &'a Value>) -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    for v in values {
        w.write_value(v)?;
    }
    w.end_stream()?;
    w.into_inner()
}
