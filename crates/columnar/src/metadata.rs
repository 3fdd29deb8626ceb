//! Reassembly metadata and the trailer
//!
//! Both are plain Rust types marshaled into values with
//! [`zed_core::to_value`], so the reassembly section is an ordinary ZNG
//! stream that any reader can inspect.

use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use zed_core::{Error, Result};

/// Magic string in the trailer's `type` field.
pub const MAGIC: &str = "zst";

/// Format version written and accepted.
pub const VERSION: u32 = 2;

/// The column tree for one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metadata {
    /// Tagged elements of a primitive or enum column.
    Primitive {
        /// Column segments.
        location: Vec<Segment>,
    },
    /// One child per field.
    Record {
        /// Fields in declaration order.
        fields: Vec<FieldMeta>,
    },
    /// Per-row lengths plus the flattened elements.
    Array {
        /// Lengths column.
        lengths: Vec<Segment>,
        /// Element column.
        values: Box<Metadata>,
    },
    /// Same layout as `Array`.
    Set {
        /// Lengths column.
        lengths: Vec<Segment>,
        /// Element column.
        values: Box<Metadata>,
    },
    /// Per-row entry counts plus key and value columns.
    Map {
        /// Entry counts column.
        lengths: Vec<Segment>,
        /// Key column.
        keys: Box<Metadata>,
        /// Value column.
        values: Box<Metadata>,
    },
    /// Per-row selectors plus one column per member.
    Union {
        /// Selector column.
        tags: Vec<Segment>,
        /// Member columns, in member order.
        values: Vec<Metadata>,
    },
    /// A presence vector over a complex column at a non-field position.
    Nulls {
        /// Presence runs; empty when every row is present.
        runs: Vec<Segment>,
        /// The wrapped column.
        values: Box<Metadata>,
    },
}

/// A record field's column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Field name.
    pub name: String,
    /// Presence runs; empty when every row is present.
    pub presence: Vec<Segment>,
    /// The field's column.
    pub values: Metadata,
}

impl Metadata {
    /// Visit every segment in the tree.
    pub fn for_each_segment(&self, f: &mut impl FnMut(&Segment)) {
        match self {
            Metadata::Primitive { location } => location.iter().for_each(&mut *f),
            Metadata::Record { fields } => {
                for field in fields {
                    field.presence.iter().for_each(&mut *f);
                    field.values.for_each_segment(f);
                }
            }
            Metadata::Array { lengths, values } | Metadata::Set { lengths, values } => {
                lengths.iter().for_each(&mut *f);
                values.for_each_segment(f);
            }
            Metadata::Map {
                lengths,
                keys,
                values,
            } => {
                lengths.iter().for_each(&mut *f);
                keys.for_each_segment(f);
                values.for_each_segment(f);
            }
            Metadata::Union { tags, values } => {
                tags.iter().for_each(&mut *f);
                for v in values {
                    v.for_each_segment(f);
                }
            }
            Metadata::Nulls { runs, values } => {
                runs.iter().for_each(&mut *f);
                values.for_each_segment(f);
            }
        }
    }
}

/// The value closing every object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer {
    /// Always [`MAGIC`].
    #[serde(rename = "type")]
    pub magic: String,
    /// Format version.
    pub version: u32,
    /// Skew threshold the object was written with.
    pub skew_thresh: u64,
    /// Segment threshold the object was written with.
    pub segment_thresh: u64,
    /// Sizes of the data and reassembly sections.
    pub sections: Vec<u64>,
}

impl Trailer {
    /// A trailer for an object with the given section sizes.
    pub fn new(skew_thresh: usize, segment_thresh: usize, data_size: u64, column_size: u64) -> Self {
        Trailer {
            magic: MAGIC.to_string(),
            version: VERSION,
            skew_thresh: skew_thresh as u64,
            segment_thresh: segment_thresh as u64,
            sections: vec![data_size, column_size],
        }
    }

    /// Check magic, version and section layout.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::BadFormat(format!("bad trailer magic {:?}", self.magic)));
        }
        if self.version != VERSION {
            return Err(Error::BadFormat(format!(
                "unsupported object version {}",
                self.version
            )));
        }
        if self.sections.len() != 2 {
            return Err(Error::BadFormat(format!(
                "trailer lists {} sections, expected 2",
                self.sections.len()
            )));
        }
        Ok(())
    }

    /// Size of the data section.
    pub fn data_size(&self) -> u64 {
        self.sections.first().copied().unwrap_or(0)
    }

    /// Size of the reassembly section.
    pub fn column_size(&self) -> u64 {
        self.sections.get(1).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zed_core::{from_value, to_value, Context};

    fn seg(offset: i64, length: i64) -> Segment {
        Segment { offset, length }
    }

    #[test]
    fn test_metadata_marshals_and_back() {
        let ctx = Context::new();
        let meta = Metadata::Nulls {
            runs: vec![],
            values: Box::new(Metadata::Record {
                fields: vec![
                    FieldMeta {
                        name: "a".into(),
                        presence: vec![seg(0, 4)],
                        values: Metadata::Primitive {
                            location: vec![seg(4, 10), seg(14, 3)],
                        },
                    },
                    FieldMeta {
                        name: "b".into(),
                        presence: vec![],
                        values: Metadata::Union {
                            tags: vec![seg(17, 2)],
                            values: vec![
                                Metadata::Primitive { location: vec![] },
                                Metadata::Nulls {
                                    runs: vec![],
                                    values: Box::new(Metadata::Array {
                                        lengths: vec![seg(19, 1)],
                                        values: Box::new(Metadata::Primitive {
                                            location: vec![seg(20, 5)],
                                        }),
                                    }),
                                },
                            ],
                        },
                    },
                ],
            }),
        };
        let v = to_value(&ctx, &meta).unwrap();
        let back: Metadata = from_value(&v).unwrap();
        assert_eq!(back, meta);

        let mut total = 0;
        back.for_each_segment(&mut |s| total += s.length);
        assert_eq!(total, 4 + 10 + 3 + 2 + 1 + 5);
    }

    #[test]
    fn test_trailer_round_trip_and_validate() {
        let ctx = Context::new();
        let t = Trailer::new(1024, 256, 1000, 200);
        let v = to_value(&ctx, &t).unwrap();
        assert!(v.typ().to_string().starts_with("{type:string,version:uint32"));
        let back: Trailer = from_value(&v).unwrap();
        assert_eq!(back, t);
        assert!(back.validate().is_ok());

        let mut bad = t.clone();
        bad.version = 1;
        assert!(matches!(bad.validate(), Err(Error::BadFormat(_))));
    }
}
