use crate::io::ReadAt;
use crate::metadata::{FieldMeta, Metadata};
use crate::presence::PresenceReader;
use crate::segment::{Segment, SegmentReader};
use std::sync::Arc;
use zed_core::zcode::Builder;
use zed_core::{coding, CancellationToken, Error, Result, Type};

/// Everything a column reader needs to open its segments.
#[derive(Clone)]
pub(crate) struct Source {
    pub(crate) read_at: Arc<dyn ReadAt>,
    pub(crate) cancel: CancellationToken,
}

impl Source {
    pub(crate) fn stream(&self, segments: &[Segment]) -> SegmentReader {
        SegmentReader::new(self.read_at.clone(), segments.to_vec(), self.cancel.clone())
    }

    pub(crate) fn presence(&self, runs: &[Segment]) -> PresenceReader {
        if runs.is_empty() {
            PresenceReader::new(None)
        } else {
            PresenceReader::new(Some(self.stream(runs)))
        }
    }
}

/// Read side of a column tree; mirrors `ColumnWriter`.
pub(crate) enum ColumnReader {
    Primitive(SegmentReader),
    Record(Vec<FieldReader>),
    Array {
        lengths: SegmentReader,
        values: Box<ColumnReader>,
    },
    Map {
        lengths: SegmentReader,
        keys: Box<ColumnReader>,
        values: Box<ColumnReader>,
    },
    Union {
        tags: SegmentReader,
        values: Vec<ColumnReader>,
    },
    Nulls {
        presence: PresenceReader,
        values: Box<ColumnReader>,
    },
}

pub(crate) struct FieldReader {
    presence: PresenceReader,
    values: ColumnReader,
}

/// Look through named and error wrappers, which add no column node.
fn strip(mut typ: &Type) -> &Type {
    loop {
        match typ {
            Type::Named(n) => typ = &n.typ,
            Type::Error(e) => typ = &e.typ,
            _ => return typ,
        }
    }
}

fn mismatch(typ: &Type) -> Error {
    Error::BadFormat(format!("reassembly metadata does not fit type {typ}"))
}

impl FieldReader {
    fn new(typ: &Type, meta: &FieldMeta, src: &Source) -> Result<Self> {
        Ok(FieldReader {
            presence: src.presence(&meta.presence),
            values: ColumnReader::new(typ, &meta.values, src)?,
        })
    }

    fn read(&mut self, b: &mut Builder) -> Result<()> {
        if self.presence.next()? {
            self.values.read(b)
        } else {
            b.append(None);
            Ok(())
        }
    }
}

impl ColumnReader {
    /// Open the readers described by `meta` for values of `typ`.
    pub(crate) fn new(typ: &Type, meta: &Metadata, src: &Source) -> Result<Self> {
        let typ = strip(typ);
        let reader = match (typ, meta) {
            (_, Metadata::Nulls { runs, values }) => ColumnReader::Nulls {
                presence: src.presence(runs),
                values: Box::new(ColumnReader::new(typ, values, src)?),
            },
            (Type::Primitive(_) | Type::Enum(_), Metadata::Primitive { location }) => {
                ColumnReader::Primitive(src.stream(location))
            }
            (Type::Record(r), Metadata::Record { fields }) => {
                if r.fields.len() != fields.len() {
                    return Err(mismatch(typ));
                }
                let mut readers = Vec::with_capacity(fields.len());
                for (f, meta) in r.fields.iter().zip(fields) {
                    if f.name != meta.name {
                        return Err(mismatch(typ));
                    }
                    readers.push(FieldReader::new(&f.typ, meta, src)?);
                }
                ColumnReader::Record(readers)
            }
            (Type::Array(a), Metadata::Array { lengths, values })
            | (Type::Set(a), Metadata::Set { lengths, values }) => ColumnReader::Array {
                lengths: src.stream(lengths),
                values: Box::new(ColumnReader::new(&a.typ, values, src)?),
            },
            (
                Type::Map(m),
                Metadata::Map {
                    lengths,
                    keys,
                    values,
                },
            ) => ColumnReader::Map {
                lengths: src.stream(lengths),
                keys: Box::new(ColumnReader::new(&m.key, keys, src)?),
                values: Box::new(ColumnReader::new(&m.value, values, src)?),
            },
            (Type::Union(u), Metadata::Union { tags, values }) => {
                if u.types.len() != values.len() {
                    return Err(mismatch(typ));
                }
                ColumnReader::Union {
                    tags: src.stream(tags),
                    values: u
                        .types
                        .iter()
                        .zip(values)
                        .map(|(t, m)| ColumnReader::new(t, m, src))
                        .collect::<Result<_>>()?,
                }
            }
            _ => return Err(mismatch(typ)),
        };
        Ok(reader)
    }

    /// Append the next value of this column to `b` as one element.
    pub(crate) fn read(&mut self, b: &mut Builder) -> Result<()> {
        match self {
            ColumnReader::Primitive(s) => {
                let elem = s.element()?;
                b.append(elem.as_deref());
            }
            ColumnReader::Nulls { presence, values } => {
                if presence.next()? {
                    values.read(b)?;
                } else {
                    b.append(None);
                }
            }
            ColumnReader::Record(fields) => {
                b.begin_container();
                for f in fields.iter_mut() {
                    f.read(b)?;
                }
                b.end_container();
            }
            ColumnReader::Array { lengths, values } => {
                let n = lengths.uint()?;
                b.begin_container();
                for _ in 0..n {
                    values.read(b)?;
                }
                b.end_container();
            }
            ColumnReader::Map {
                lengths,
                keys,
                values,
            } => {
                let n = lengths.uint()?;
                b.begin_container();
                for _ in 0..n {
                    keys.read(b)?;
                    values.read(b)?;
                }
                b.end_container();
            }
            ColumnReader::Union { tags, values } => {
                let sel = tags.uint()?;
                let member = values
                    .get_mut(sel as usize)
                    .ok_or_else(|| Error::out_of_range("union selector", sel))?;
                b.begin_container();
                b.append(Some(&coding::encode_uint(sel)[..]));
                member.read(b)?;
                b.end_container();
            }
        }
        Ok(())
    }
}
