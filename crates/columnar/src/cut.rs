//! Cut readers: read selected paths without touching other columns.

use crate::column::{ColumnReader, Source};
use crate::metadata::Metadata;
use crate::presence::PresenceReader;
use crate::reader::{element_value, Object};
use crate::segment::SegmentReader;
use std::sync::Arc;
use tracing::debug;
use zed_core::zcode::{read_element, Builder};
use zed_core::{
    CancellationToken, Context, Error, FieldPath, RecordBuilder, Result, Type, Value, ValueReader,
};

/// Reads the value at one path: the presence vectors of every record on
/// the way down, then the leaf column.
struct PathReader {
    presences: Vec<PresenceReader>,
    leaf: ColumnReader,
}

impl PathReader {
    /// Open a reader for `path` within values of `typ`, or `None` if the
    /// type lacks the path.
    fn new(
        typ: &Type,
        meta: &Metadata,
        path: &FieldPath,
        src: &Source,
    ) -> Result<Option<(PathReader, Type)>> {
        let mut leaf_type = typ.clone();
        let mut meta = meta;
        let mut presences = Vec::new();
        for name in path.components() {
            if let Metadata::Nulls { runs, values } = meta {
                presences.push(src.presence(runs));
                meta = values;
            }
            // Field paths see through named types only, as `Value::deref` does.
            let (record, fields) = match (leaf_type.under(), meta) {
                (Type::Record(r), Metadata::Record { fields }) => (r.clone(), fields),
                _ => return Ok(None),
            };
            let i = match record.index_of(name) {
                Some(i) => i,
                None => return Ok(None),
            };
            let field = fields
                .get(i)
                .filter(|f| f.name == *name)
                .ok_or_else(|| Error::BadFormat(format!("reassembly metadata lacks field {name}")))?;
            presences.push(src.presence(&field.presence));
            meta = &field.values;
            leaf_type = record.fields[i].typ.clone();
        }
        let leaf = ColumnReader::new(&leaf_type, meta, src)?;
        Ok(Some((PathReader { presences, leaf }, leaf_type)))
    }

    fn read(&mut self, b: &mut Builder) -> Result<()> {
        for p in &mut self.presences {
            if !p.next()? {
                b.append(None);
                return Ok(());
            }
        }
        self.leaf.read(b)
    }
}

struct TypeCut {
    paths: Vec<PathReader>,
    out: Type,
}

/// Yields the values at one or more paths of an object's values.
///
/// Values whose type lacks a requested path are skipped without reading
/// any of their columns.
pub struct CutReader {
    root: SegmentReader,
    per_type: Vec<Option<TypeCut>>,
    record: Option<RecordBuilder>,
    builders: Vec<Builder>,
}

impl CutReader {
    pub(crate) fn new(
        object: &Object,
        paths: &[FieldPath],
        as_record: bool,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let ctx: &Arc<Context> = object.context();
        let record = if as_record {
            Some(RecordBuilder::new(paths)?)
        } else {
            None
        };
        let src = object.source(cancel);
        let mut per_type = Vec::with_capacity(object.types().len());
        for (typ, meta) in object.types().iter().zip(object.metadata()) {
            let mut readers = Vec::with_capacity(paths.len());
            let mut leaf_types = Vec::with_capacity(paths.len());
            for path in paths {
                match PathReader::new(typ, meta, path, &src)? {
                    Some((r, t)) => {
                        readers.push(r);
                        leaf_types.push(t);
                    }
                    None => break,
                }
            }
            if readers.len() != paths.len() || paths.is_empty() {
                per_type.push(None);
                continue;
            }
            let out = match &record {
                Some(rb) => rb.build_type(ctx, &leaf_types)?,
                None => leaf_types.swap_remove(0),
            };
            per_type.push(Some(TypeCut {
                paths: readers,
                out,
            }));
        }
        let kept = per_type.iter().filter(|c| c.is_some()).count();
        debug!(
            target: "zed::columnar",
            paths = paths.len(),
            types = per_type.len(),
            kept,
            "opened cut reader"
        );
        Ok(CutReader {
            root: object.root_reader(&src),
            per_type,
            record,
            builders: paths.iter().map(|_| Builder::new()).collect(),
        })
    }

    /// Read the next cut value.
    pub fn read(&mut self) -> Result<Option<Value>> {
        loop {
            if self.root.at_end()? {
                return Ok(None);
            }
            let id = self.root.uint()?;
            let cut = match self.per_type.get_mut(id as usize) {
                Some(Some(cut)) => cut,
                Some(None) => continue,
                None => return Err(Error::out_of_range("object type id", id)),
            };
            for (r, b) in cut.paths.iter_mut().zip(&mut self.builders) {
                b.reset();
                r.read(b)?;
            }
            let rb = match &self.record {
                Some(rb) => rb,
                None => {
                    let buf = self.builders[0].take();
                    return element_value(cut.out.clone(), buf).map(Some);
                }
            };
            let mut leaves = Vec::with_capacity(self.builders.len());
            for b in &self.builders {
                leaves.push(read_element(b.bytes())?.0);
            }
            let body = rb.build_body(&leaves)?;
            return Ok(Some(Value::new(cut.out.clone(), Some(body.into()))));
        }
    }
}

impl ValueReader for CutReader {
    fn read(&mut self) -> Result<Option<Value>> {
        CutReader::read(self)
    }
}
