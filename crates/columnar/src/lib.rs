//! Columnar object format for Zed values.
//!
//! A columnar object stores a sequence of values of any mix of types.
//! Each distinct type is shredded into a tree of columns; each column is
//! a stream of zcode elements cut into segments. An object is laid out as
//!
//! ```text
//! +--------------+-------------------+---------+
//! | data section | reassembly section| trailer |
//! +--------------+-------------------+---------+
//! ```
//!
//! The data section holds column segments in the order they were spilled.
//! The reassembly section is a ZNG stream carrying the types, the root
//! column of type IDs and one [`Metadata`] tree per type. The trailer is a
//! single ZNG record with the format magic, version, writer thresholds and
//! section sizes, located by scanning backward from the end of the object.
//!
//! Writers spill a column whenever it reaches the segment threshold and
//! flush every column whenever the bytes buffered across all of them
//! reach the skew threshold, so memory stays bounded no matter how values
//! are distributed over types.
//!
//! Readers pull segments lazily through a [`ReadAt`] source. A
//! [`CutReader`] reads only the columns on the requested paths.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod column;
pub mod config;
mod cut;
pub mod io;
pub mod metadata;
mod presence;
mod reader;
pub mod segment;
mod writer;

pub use config::{ColumnConfigError, WriterConfig};
pub use cut::CutReader;
pub use io::{map_file, read_exact_at, FileSink, ReadAt, WriteSink};
pub use metadata::{FieldMeta, Metadata, Trailer};
pub use reader::{Object, ObjectReader, TRAILER_SCAN};
pub use segment::Segment;
pub use writer::Writer;
