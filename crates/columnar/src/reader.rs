//! Columnar object reader.

use crate::column::{ColumnReader, Source};
use crate::cut::CutReader;
use crate::io::{read_exact_at, ReadAt};
use crate::metadata::{Metadata, Trailer};
use crate::segment::{Segment, SegmentReader};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};
use zed_core::zcode::{read_element, Builder};
use zed_core::{
    from_value, CancellationToken, Context, Error, FieldPath, Result, Type, Value, ValueReader,
};

/// How far back from the end of an object the trailer is searched for.
pub const TRAILER_SCAN: u64 = 4096;

/// An open columnar object.
///
/// Opening reads only the trailer and the reassembly section. Column
/// segments are read as values are pulled, by [`read`](Object::read) or by
/// any number of independent [`reader`](Object::reader)s and
/// [`cut`](Object::cut)s sharing the same source.
pub struct Object {
    ctx: Arc<Context>,
    source: Arc<dyn ReadAt>,
    trailer: Trailer,
    types: Vec<Type>,
    metadata: Vec<Metadata>,
    root: Vec<Segment>,
    reader: Option<ObjectReader>,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("trailer", &self.trailer)
            .field("types", &self.types.len())
            .finish()
    }
}

impl Object {
    /// Open the object of `size` bytes in `source`. Its types are interned
    /// in `ctx`.
    pub fn open(ctx: Arc<Context>, source: Arc<dyn ReadAt>, size: u64) -> Result<Self> {
        let (trailer, trailer_off) = find_trailer(source.as_ref(), size)?;
        let data_size = trailer.data_size();
        let column_size = trailer.column_size();
        if data_size.checked_add(column_size) != Some(trailer_off) {
            return Err(Error::BadFormat(format!(
                "trailer sections {data_size}+{column_size} do not end at offset {trailer_off}"
            )));
        }

        let mut section = vec![0u8; column_size as usize];
        read_exact_at(source.as_ref(), data_size, &mut section)?;
        let meta_ctx = Arc::new(Context::new());
        let values = zed_zng::decode_all(meta_ctx, &section)?;
        if values.len() % 2 != 1 {
            return Err(Error::BadFormat(format!(
                "reassembly section holds {} values",
                values.len()
            )));
        }
        let n = values.len() / 2;
        let mut types = Vec::with_capacity(n);
        for v in &values[..n] {
            types.push(ctx.translate(v.typ())?);
        }
        let root: Vec<Segment> = from_value(&values[n])?;
        let mut metadata = Vec::with_capacity(n);
        for v in &values[n + 1..] {
            metadata.push(from_value::<Metadata>(v)?);
        }

        let mut bad = None;
        let mut check = |s: &Segment| {
            if s.offset < 0 || s.length < 0 || s.end() as u64 > data_size {
                bad.get_or_insert(*s);
            }
        };
        root.iter().for_each(&mut check);
        for m in &metadata {
            m.for_each_segment(&mut check);
        }
        if let Some(s) = bad {
            return Err(Error::BadFormat(format!(
                "segment {}+{} lies outside the data section",
                s.offset, s.length
            )));
        }

        info!(target: "zed::columnar", size, types = n, data_size, "opened columnar object");
        Ok(Object {
            ctx,
            source,
            trailer,
            types,
            metadata,
            root,
            reader: None,
        })
    }

    /// Open an object held in memory.
    pub fn from_bytes(ctx: Arc<Context>, bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes: Bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::open(ctx, Arc::new(bytes), size)
    }

    /// The trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Distinct value types, in first-appearance order.
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Reassembly metadata, one per type.
    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// The context types are interned in.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub(crate) fn source(&self, cancel: CancellationToken) -> Source {
        Source {
            read_at: self.source.clone(),
            cancel,
        }
    }

    pub(crate) fn root_reader(&self, src: &Source) -> SegmentReader {
        src.stream(&self.root)
    }

    /// A reader over every value, in write order.
    pub fn reader(&self, cancel: CancellationToken) -> Result<ObjectReader> {
        let src = self.source(cancel);
        let columns = self
            .types
            .iter()
            .zip(&self.metadata)
            .map(|(t, m)| ColumnReader::new(t, m, &src))
            .collect::<Result<_>>()?;
        Ok(ObjectReader {
            types: self.types.clone(),
            root: self.root_reader(&src),
            columns,
            builder: Builder::new(),
        })
    }

    /// Read the next value; `None` once every value has been read.
    pub fn read(&mut self) -> Result<Option<Value>> {
        if self.reader.is_none() {
            self.reader = Some(self.reader(CancellationToken::new())?);
        }
        match self.reader.as_mut() {
            Some(r) => r.read(),
            None => Ok(None),
        }
    }

    /// A reader yielding the value at `path` of every value that has it.
    /// Values whose type lacks the path are skipped.
    pub fn cut(&self, path: &FieldPath, cancel: CancellationToken) -> Result<CutReader> {
        CutReader::new(self, std::slice::from_ref(path), false, cancel)
    }

    /// A reader yielding records of the values at `paths`, for every value
    /// whose type has all of them.
    pub fn cut_fields(&self, paths: &[FieldPath], cancel: CancellationToken) -> Result<CutReader> {
        CutReader::new(self, paths, true, cancel)
    }
}

/// Locate and decode the trailer, returning it with its offset.
fn find_trailer(source: &dyn ReadAt, size: u64) -> Result<(Trailer, u64)> {
    let scan = size.min(TRAILER_SCAN);
    let base = size - scan;
    let mut tail = vec![0u8; scan as usize];
    read_exact_at(source, base, &mut tail)?;

    let scratch = Arc::new(Context::new());
    for start in (0..tail.len()).rev() {
        // a trailer stream opens with its types frame
        if tail[start] != zed_zng::FrameKind::Types.code() {
            continue;
        }
        let values = match zed_zng::decode_all(scratch.clone(), &tail[start..]) {
            Ok(v) if v.len() == 1 => v,
            _ => continue,
        };
        let trailer: Trailer = match from_value(&values[0]) {
            Ok(t) => t,
            Err(_) => continue,
        };
        trailer.validate()?;
        debug!(target: "zed::columnar", offset = base + start as u64, "found trailer");
        return Ok((trailer, base + start as u64));
    }
    Err(Error::BadFormat("columnar trailer not found".into()))
}

/// Reads every value of an object in write order.
pub struct ObjectReader {
    types: Vec<Type>,
    root: SegmentReader,
    columns: Vec<ColumnReader>,
    builder: Builder,
}

impl ObjectReader {
    /// Read the next value.
    pub fn read(&mut self) -> Result<Option<Value>> {
        if self.root.at_end()? {
            return Ok(None);
        }
        let id = self.root.uint()?;
        let column = self
            .columns
            .get_mut(id as usize)
            .ok_or_else(|| Error::out_of_range("object type id", id))?;
        self.builder.reset();
        column.read(&mut self.builder)?;
        let value = element_value(self.types[id as usize].clone(), self.builder.take())?;
        Ok(Some(value))
    }
}

impl ValueReader for ObjectReader {
    fn read(&mut self) -> Result<Option<Value>> {
        ObjectReader::read(self)
    }
}

/// Unwrap the single element in `buf` into a value of `typ`.
pub(crate) fn element_value(typ: Type, buf: Vec<u8>) -> Result<Value> {
    let buf = Bytes::from(buf);
    let (body, total) = read_element(&buf)?;
    let body = body.map(|b| buf.slice(total - b.len()..total));
    Ok(Value::new(typ, body))
}
