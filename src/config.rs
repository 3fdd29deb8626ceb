//! Configuration via `zed.toml`
//!
//! One file configures every component. Each section and every key is
//! optional; anything left out takes the component's default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use zed_columnar::WriterConfig;
use zed_core::{ContextConfig, Error, Result};
use zed_journal::StoreConfig;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "zed.toml";

/// `[types]`: type context caps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypesSection {
    /// Maximum fields in one record type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_record_fields: Option<usize>,
    /// Maximum members in one union type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_union_types: Option<usize>,
    /// Maximum symbols in one enum type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_enum_symbols: Option<usize>,
    /// Maximum type-value nesting depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_decode_depth: Option<usize>,
}

/// `[columnar]`: columnar writer thresholds, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnarSection {
    /// Bytes buffered across all columns before a full flush.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_thresh: Option<usize>,
    /// Bytes buffered in one column before it spills a segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_thresh: Option<usize>,
}

/// `[journal]`: keyed store behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalSection {
    /// Commit attempts per write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<usize>,
    /// Table age in milliseconds that triggers a reload on read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_after_ms: Option<u64>,
    /// Sleep in milliseconds after a lost commit race.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
}

/// Configuration loaded from `zed.toml`.
///
/// # Example
///
/// ```toml
/// [columnar]
/// segment_thresh = 1048576
///
/// [journal]
/// max_retries = 20
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZedConfig {
    /// Type context caps.
    pub types: TypesSection,
    /// Columnar writer thresholds.
    pub columnar: ColumnarSection,
    /// Keyed store behaviour.
    pub journal: JournalSection,
}

impl ZedConfig {
    /// Parse configuration text and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ZedConfig = toml::from_str(s)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            e => e,
        })
    }

    /// Serialize to TOML, leaving out unset keys.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {e}")))
    }

    /// Check every section against its component's rules.
    pub fn validate(&self) -> Result<()> {
        self.context_config().validate()?;
        self.writer_config().validate()?;
        self.store_config().validate()?;
        Ok(())
    }

    /// Type context configuration.
    pub fn context_config(&self) -> ContextConfig {
        let t = &self.types;
        let mut c = ContextConfig::default();
        if let Some(n) = t.max_record_fields {
            c = c.with_max_record_fields(n);
        }
        if let Some(n) = t.max_union_types {
            c = c.with_max_union_types(n);
        }
        if let Some(n) = t.max_enum_symbols {
            c = c.with_max_enum_symbols(n);
        }
        if let Some(n) = t.max_decode_depth {
            c = c.with_max_decode_depth(n);
        }
        c
    }

    /// Columnar writer configuration.
    pub fn writer_config(&self) -> WriterConfig {
        let mut c = WriterConfig::default();
        if let Some(n) = self.columnar.skew_thresh {
            c = c.with_skew_thresh(n);
        }
        if let Some(n) = self.columnar.segment_thresh {
            c = c.with_segment_thresh(n);
        }
        c
    }

    /// Keyed store configuration.
    pub fn store_config(&self) -> StoreConfig {
        let j = &self.journal;
        let mut c = StoreConfig::default();
        if let Some(n) = j.max_retries {
            c = c.with_max_retries(n);
        }
        if let Some(ms) = j.stale_after_ms {
            c = c.with_stale_after(Duration::from_millis(ms));
        }
        if let Some(ms) = j.retry_backoff_ms {
            c = c.with_retry_backoff(Duration::from_millis(ms));
        }
        c
    }
}
