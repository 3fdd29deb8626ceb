//! Core data model for Zed
//!
//! This crate defines the foundation every format and store builds on:
//! - Type system: primitive and complex types, interned in a [`Context`]
//! - Type values: the canonical binary encoding of a type
//! - zcode: the tagged, length-prefixed value body encoding
//! - [`Value`]: a type paired with a body, plus primitive coding helpers
//! - [`Arena`]: compact handles for values built in bulk
//! - [`RecordBuilder`]: nested records from field paths
//! - Batches: the pull-based [`Puller`] contract and reader/writer traits
//! - Marshaling: serde to and from values
//! - Error: the shared error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod batch;
pub mod cancel;
pub mod coding;
pub mod config;
pub mod context;
pub mod error;
pub mod marshal;
pub mod path;
pub mod record_builder;
pub mod types;
pub mod typevalue;
pub mod value;
pub mod zcode;

pub use arena::{Arena, ArenaPool, ArenaValue, SharedArena};
pub use batch::{copy, Batch, IterReader, Puller, ReaderPuller, ValueReader, ValueWriter};
pub use cancel::CancellationToken;
pub use config::{ContextConfig, ContextConfigError};
pub use context::Context;
pub use error::{Error, Result, TypeValueError};
pub use marshal::{from_value, to_value};
pub use path::FieldPath;
pub use record_builder::RecordBuilder;
pub use types::{
    compare_types, Field, Kind, PrimitiveType, Type, TypeArray, TypeEnum, TypeError, TypeMap,
    TypeNamed, TypeRecord, TypeUnion,
};
pub use typevalue::{encode_type_value, format_type_value};
pub use value::Value;
