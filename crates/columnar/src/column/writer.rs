use crate::io::WriteSink;
use crate::metadata::{FieldMeta, Metadata};
use crate::presence::PresenceWriter;
use crate::segment::{SegmentStream, Spiller};
use zed_core::zcode::Iter;
use zed_core::{coding, Error, Result, Type};

/// Write side of a column tree, shaped after one type.
#[derive(Debug)]
pub(crate) enum ColumnWriter {
    Primitive(SegmentStream),
    Record(Vec<FieldWriter>),
    Array {
        set: bool,
        lengths: SegmentStream,
        values: Box<ColumnWriter>,
    },
    Map {
        lengths: SegmentStream,
        keys: Box<ColumnWriter>,
        values: Box<ColumnWriter>,
    },
    Union {
        tags: SegmentStream,
        values: Vec<ColumnWriter>,
    },
    Nulls {
        presence: PresenceWriter,
        values: Box<ColumnWriter>,
    },
}

#[derive(Debug)]
pub(crate) struct FieldWriter {
    name: String,
    presence: PresenceWriter,
    values: ColumnWriter,
}

impl FieldWriter {
    fn write<S: WriteSink>(&mut self, body: Option<&[u8]>, sp: &mut Spiller<S>) -> Result<()> {
        match body {
            None => {
                self.presence.null();
                Ok(())
            }
            Some(_) => {
                self.presence.value();
                self.values.write(body, sp)
            }
        }
    }
}

fn malformed(what: &str) -> Error {
    Error::BadValue(format!("malformed {what} body"))
}

/// Complex columns below a presence vector only ever see present bodies.
fn required(body: Option<&[u8]>) -> Result<&[u8]> {
    body.ok_or_else(|| Error::BadValue("null reached a column without a presence vector".into()))
}

impl ColumnWriter {
    /// Build the column tree for `typ`. `nullable` wraps complex columns in
    /// a presence vector; record fields carry their own.
    pub(crate) fn new(typ: &Type, nullable: bool) -> Self {
        let node = match typ {
            Type::Named(n) => return ColumnWriter::new(&n.typ, nullable),
            Type::Error(e) => return ColumnWriter::new(&e.typ, nullable),
            Type::Primitive(_) | Type::Enum(_) => return ColumnWriter::Primitive(SegmentStream::new()),
            Type::Record(r) => ColumnWriter::Record(
                r.fields
                    .iter()
                    .map(|f| FieldWriter {
                        name: f.name.clone(),
                        presence: PresenceWriter::new(),
                        values: ColumnWriter::new(&f.typ, false),
                    })
                    .collect(),
            ),
            Type::Array(a) | Type::Set(a) => ColumnWriter::Array {
                set: matches!(typ, Type::Set(_)),
                lengths: SegmentStream::new(),
                values: Box::new(ColumnWriter::new(&a.typ, true)),
            },
            Type::Map(m) => ColumnWriter::Map {
                lengths: SegmentStream::new(),
                keys: Box::new(ColumnWriter::new(&m.key, true)),
                values: Box::new(ColumnWriter::new(&m.value, true)),
            },
            Type::Union(u) => ColumnWriter::Union {
                tags: SegmentStream::new(),
                values: u.types.iter().map(|t| ColumnWriter::new(t, true)).collect(),
            },
        };
        if nullable {
            ColumnWriter::Nulls {
                presence: PresenceWriter::new(),
                values: Box::new(node),
            }
        } else {
            node
        }
    }

    /// Shred one value body into the tree.
    pub(crate) fn write<S: WriteSink>(
        &mut self,
        body: Option<&[u8]>,
        sp: &mut Spiller<S>,
    ) -> Result<()> {
        match self {
            ColumnWriter::Primitive(s) => s.append(body, sp)?,
            ColumnWriter::Nulls { presence, values } => match body {
                None => presence.null(),
                Some(_) => {
                    presence.value();
                    values.write(body, sp)?;
                }
            },
            ColumnWriter::Record(fields) => {
                let mut it = Iter::new(required(body)?);
                for f in fields.iter_mut() {
                    f.write(it.try_next()?, sp)?;
                }
                if !it.done() {
                    return Err(malformed("record"));
                }
            }
            ColumnWriter::Array {
                lengths, values, ..
            } => {
                let body = required(body)?;
                let n = Iter::new(body).count_remaining()?;
                lengths.append_uint(n as u64, sp)?;
                let mut it = Iter::new(body);
                while !it.done() {
                    values.write(it.try_next()?, sp)?;
                }
            }
            ColumnWriter::Map {
                lengths,
                keys,
                values,
            } => {
                let body = required(body)?;
                let n = Iter::new(body).count_remaining()?;
                if n % 2 != 0 {
                    return Err(malformed("map"));
                }
                lengths.append_uint((n / 2) as u64, sp)?;
                let mut it = Iter::new(body);
                while !it.done() {
                    keys.write(it.try_next()?, sp)?;
                    values.write(it.try_next()?, sp)?;
                }
            }
            ColumnWriter::Union { tags, values } => {
                let mut it = Iter::new(required(body)?);
                let sel = it
                    .try_next()?
                    .ok_or_else(|| malformed("union"))
                    .and_then(coding::decode_uint)?;
                let member = values
                    .get_mut(sel as usize)
                    .ok_or_else(|| Error::out_of_range("union selector", sel))?;
                tags.append_uint(sel, sp)?;
                member.write(it.try_next()?, sp)?;
            }
        }
        Ok(())
    }

    /// Walk `body` against the tree's shape without writing anything, so a
    /// malformed value is rejected before any column is touched.
    pub(crate) fn check(&self, body: Option<&[u8]>) -> Result<()> {
        match self {
            ColumnWriter::Primitive(_) => Ok(()),
            ColumnWriter::Nulls { values, .. } => match body {
                None => Ok(()),
                Some(_) => values.check(body),
            },
            ColumnWriter::Record(fields) => {
                let mut it = Iter::new(required(body)?);
                for f in fields {
                    let field = it.try_next()?;
                    if field.is_some() {
                        f.values.check(field)?;
                    }
                }
                if !it.done() {
                    return Err(malformed("record"));
                }
                Ok(())
            }
            ColumnWriter::Array { values, .. } => {
                let mut it = Iter::new(required(body)?);
                while !it.done() {
                    values.check(it.try_next()?)?;
                }
                Ok(())
            }
            ColumnWriter::Map { keys, values, .. } => {
                let mut it = Iter::new(required(body)?);
                while !it.done() {
                    keys.check(it.try_next()?)?;
                    if it.done() {
                        return Err(malformed("map"));
                    }
                    values.check(it.try_next()?)?;
                }
                Ok(())
            }
            ColumnWriter::Union { values, .. } => {
                let mut it = Iter::new(required(body)?);
                let sel = it
                    .try_next()?
                    .ok_or_else(|| malformed("union"))
                    .and_then(coding::decode_uint)?;
                let member = values
                    .get(sel as usize)
                    .ok_or_else(|| Error::out_of_range("union selector", sel))?;
                member.check(it.try_next()?)?;
                if !it.done() {
                    return Err(malformed("union"));
                }
                Ok(())
            }
        }
    }

    /// Spill buffered bytes. At end of input presence vectors are written
    /// too.
    pub(crate) fn flush<S: WriteSink>(&mut self, eof: bool, sp: &mut Spiller<S>) -> Result<()> {
        match self {
            ColumnWriter::Primitive(s) => s.flush(sp),
            ColumnWriter::Record(fields) => {
                for f in fields {
                    if eof {
                        f.presence.finish(sp)?;
                    }
                    f.values.flush(eof, sp)?;
                }
                Ok(())
            }
            ColumnWriter::Array {
                lengths, values, ..
            } => {
                lengths.flush(sp)?;
                values.flush(eof, sp)
            }
            ColumnWriter::Map {
                lengths,
                keys,
                values,
            } => {
                lengths.flush(sp)?;
                keys.flush(eof, sp)?;
                values.flush(eof, sp)
            }
            ColumnWriter::Union { tags, values } => {
                tags.flush(sp)?;
                for v in values {
                    v.flush(eof, sp)?;
                }
                Ok(())
            }
            ColumnWriter::Nulls { presence, values } => {
                if eof {
                    presence.finish(sp)?;
                }
                values.flush(eof, sp)
            }
        }
    }

    /// Bytes buffered in the tree and not yet spilled.
    pub(crate) fn buffered(&self) -> usize {
        match self {
            ColumnWriter::Primitive(s) => s.buffered(),
            ColumnWriter::Record(fields) => fields.iter().map(|f| f.values.buffered()).sum(),
            ColumnWriter::Array {
                lengths, values, ..
            } => lengths.buffered() + values.buffered(),
            ColumnWriter::Map {
                lengths,
                keys,
                values,
            } => lengths.buffered() + keys.buffered() + values.buffered(),
            ColumnWriter::Union { tags, values } => {
                tags.buffered() + values.iter().map(ColumnWriter::buffered).sum::<usize>()
            }
            ColumnWriter::Nulls { values, .. } => values.buffered(),
        }
    }

    /// The reassembly metadata. Valid after a final flush.
    pub(crate) fn metadata(&self) -> Metadata {
        match self {
            ColumnWriter::Primitive(s) => Metadata::Primitive {
                location: s.segments().to_vec(),
            },
            ColumnWriter::Record(fields) => Metadata::Record {
                fields: fields
                    .iter()
                    .map(|f| FieldMeta {
                        name: f.name.clone(),
                        presence: f.presence.segments(),
                        values: f.values.metadata(),
                    })
                    .collect(),
            },
            ColumnWriter::Array {
                set,
                lengths,
                values,
            } => {
                let lengths = lengths.segments().to_vec();
                let values = Box::new(values.metadata());
                if *set {
                    Metadata::Set { lengths, values }
                } else {
                    Metadata::Array { lengths, values }
                }
            }
            ColumnWriter::Map {
                lengths,
                keys,
                values,
            } => Metadata::Map {
                lengths: lengths.segments().to_vec(),
                keys: Box::new(keys.metadata()),
                values: Box::new(values.metadata()),
            },
            ColumnWriter::Union { tags, values } => Metadata::Union {
                tags: tags.segments().to_vec(),
                values: values.iter().map(ColumnWriter::metadata).collect(),
            },
            ColumnWriter::Nulls { presence, values } => Metadata::Nulls {
                runs: presence.segments(),
                values: Box::new(values.metadata()),
            },
        }
    }
}
