//! Columnar object writer.

use crate::column::ColumnWriter;
use crate::config::WriterConfig;
use crate::io::WriteSink;
use crate::metadata::Trailer;
use crate::segment::{SegmentStream, Spiller};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use zed_core::{to_value, Context, Error, Result, Type, Value, ValueWriter};

/// Shreds values into columns and writes a columnar object to a sink.
///
/// The object is complete only after [`close`](Writer::close). A value whose
/// body does not match its type is rejected without touching any column.
/// Any other failure leaves the writer failed: later writes and `close`
/// return an error and the writer should be [`abort`](Writer::abort)ed.
///
/// # Example
///
/// ```
/// use zed_columnar::{Writer, WriterConfig};
/// use zed_core::Value;
///
/// let mut w = Writer::new(Vec::new(), WriterConfig::default())?;
/// w.write(&Value::int64(1))?;
/// let object: Vec<u8> = w.close()?;
/// assert!(!object.is_empty());
/// # Ok::<(), zed_core::Error>(())
/// ```
pub struct Writer<S: WriteSink> {
    config: WriterConfig,
    sp: Spiller<S>,
    /// Object-local type ID of every value, in order.
    root: SegmentStream,
    /// Distinct types in first-appearance order; the index is the local ID.
    types: Vec<Type>,
    index: FxHashMap<Type, usize>,
    columns: Vec<ColumnWriter>,
    values: u64,
    failed: bool,
}

impl<S: WriteSink> Writer<S> {
    /// Create a writer over `sink`. Rejects an invalid configuration.
    pub fn new(sink: S, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Writer {
            sp: Spiller::new(sink, config.segment_thresh),
            config,
            root: SegmentStream::new(),
            types: Vec::new(),
            index: FxHashMap::default(),
            columns: Vec::new(),
            values: 0,
            failed: false,
        })
    }

    /// Append one value.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.check_live()?;
        let id = match self.index.get(value.typ()) {
            Some(&id) => {
                self.columns[id].check(value.bytes())?;
                id
            }
            None => {
                let column = ColumnWriter::new(value.typ(), true);
                column.check(value.bytes())?;
                let id = self.types.len();
                self.types.push(value.typ().clone());
                self.index.insert(value.typ().clone(), id);
                self.columns.push(column);
                debug!(target: "zed::columnar", id, typ = %value.typ(), "new column tree");
                id
            }
        };
        if let Err(e) = self.append(id, value) {
            warn!(target: "zed::columnar", values = self.values, error = %e, "columnar write failed");
            self.failed = true;
            return Err(e);
        }
        Ok(())
    }

    fn append(&mut self, id: usize, value: &Value) -> Result<()> {
        self.root.append_uint(id as u64, &mut self.sp)?;
        self.columns[id].write(value.bytes(), &mut self.sp)?;
        self.values += 1;
        if self.sp.buffered >= self.config.skew_thresh {
            debug!(target: "zed::columnar", buffered = self.sp.buffered, "skew threshold reached");
            self.flush(false)?;
        }
        Ok(())
    }

    fn check_live(&self) -> Result<()> {
        if self.failed {
            return Err(Error::BadFormat(
                "columnar writer failed; the object must be aborted".into(),
            ));
        }
        Ok(())
    }

    /// Bytes buffered in columns and not yet spilled.
    pub fn buffered(&self) -> usize {
        self.root.buffered() + self.columns.iter().map(ColumnWriter::buffered).sum::<usize>()
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.root.flush(&mut self.sp)?;
        for c in &mut self.columns {
            c.flush(eof, &mut self.sp)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush(true)?;
        let data_size = self.sp.offset;

        // The reassembly section: one null per type (so a reader's context
        // defines them in the same order), the root segmap, then one
        // metadata value per type.
        let meta_ctx = Context::new();
        let mut zw = zed_zng::Writer::new(Vec::new());
        for typ in &self.types {
            zw.write_value(&Value::null(typ.clone()))?;
        }
        zw.write_value(&to_value(&meta_ctx, self.root.segments())?)?;
        for c in &self.columns {
            zw.write_value(&to_value(&meta_ctx, &c.metadata())?)?;
        }
        zw.end_stream()?;
        let section = zw.into_inner()?;
        self.sp.write_raw(&section)?;

        let trailer = Trailer::new(
            self.config.skew_thresh,
            self.config.segment_thresh,
            data_size,
            section.len() as u64,
        );
        let trailer = zed_zng::encode_all(&[to_value(&meta_ctx, &trailer)?])?;
        self.sp.write_raw(&trailer)?;
        Ok(())
    }

    /// Finish the object, close the sink and return it.
    ///
    /// On failure the sink is still closed, leaving an incomplete object.
    pub fn close(mut self) -> Result<S> {
        if let Err(e) = self.check_live().and_then(|()| self.finish()) {
            let _ = self.sp.sink.close();
            return Err(e);
        }
        self.sp.sink.close()?;
        info!(
            target: "zed::columnar",
            values = self.values,
            types = self.types.len(),
            segments = self.sp.segments,
            size = self.sp.offset,
            "closed columnar object"
        );
        Ok(self.sp.sink)
    }

    /// Give up on the object and remove whatever was written.
    pub fn abort(mut self) -> Result<()> {
        debug!(target: "zed::columnar", values = self.values, "aborting columnar object");
        self.sp.sink.abort()
    }
}

impl<S: WriteSink> ValueWriter for Writer<S> {
    fn write(&mut self, value: &Value) -> Result<()> {
        Writer::write(self, value)
    }
}
