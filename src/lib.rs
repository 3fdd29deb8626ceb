//! Zed data core
//!
//! Super-structured values and the formats that carry them:
//!
//! - [`data`]: the type context, zcode value codec, arenas and serde bridge
//! - [`zng`]: the row-oriented ZNG frame stream
//! - [`columnar`]: columnar objects with lazy column reads and cuts
//! - [`journal`]: the append-only journal and keyed catalog store
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use zed::columnar::{Object, Writer};
//! use zed::data::{to_value, Context};
//! use zed::ZedConfig;
//!
//! #[derive(serde::Serialize)]
//! struct Point {
//!     x: i64,
//! }
//!
//! let config = ZedConfig::default();
//! let ctx = Arc::new(Context::with_config(config.context_config())?);
//! let mut w = Writer::new(Vec::new(), config.writer_config())?;
//! w.write(&to_value(&ctx, &Point { x: 1 })?)?;
//! let bytes = w.close()?;
//!
//! let mut obj = Object::from_bytes(ctx, bytes)?;
//! assert_eq!(obj.read()?.unwrap().to_string(), "{x:1}");
//! # Ok::<(), zed::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;

pub use config::ZedConfig;
pub use zed_core::{Error, Result, Type, Value};

pub use zed_columnar as columnar;
pub use zed_core as data;
pub use zed_journal as journal;
pub use zed_zng as zng;
