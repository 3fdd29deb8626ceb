//! Columnar writer configuration.
//!
//! Two thresholds bound a writer's memory:
//! - `segment_thresh`: a column buffer is spilled to the sink as a segment
//!   once it holds this many bytes
//! - `skew_thresh`: once the bytes buffered across all columns reach this
//!   figure, every column is flushed

/// Default segment threshold (5 MiB).
pub const DEFAULT_SEGMENT_THRESH: usize = 5 * 1024 * 1024;

/// Default skew threshold (25 MiB).
pub const DEFAULT_SKEW_THRESH: usize = 25 * 1024 * 1024;

/// Largest accepted segment threshold (20 MiB).
pub const MAX_SEGMENT_THRESH: usize = 20 * 1024 * 1024;

/// Largest accepted skew threshold (512 MiB).
pub const MAX_SKEW_THRESH: usize = 512 * 1024 * 1024;

/// Columnar writer configuration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Bytes buffered across all columns before a full flush (default: 25 MiB).
    pub skew_thresh: usize,

    /// Bytes buffered in one column before it spills a segment (default: 5 MiB).
    pub segment_thresh: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            skew_thresh: DEFAULT_SKEW_THRESH,
            segment_thresh: DEFAULT_SEGMENT_THRESH,
        }
    }
}

impl WriterConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the skew threshold.
    pub fn with_skew_thresh(mut self, bytes: usize) -> Self {
        self.skew_thresh = bytes;
        self
    }

    /// Set the segment threshold.
    pub fn with_segment_thresh(mut self, bytes: usize) -> Self {
        self.segment_thresh = bytes;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ColumnConfigError> {
        if self.segment_thresh == 0 {
            return Err(ColumnConfigError::ZeroSegmentThresh);
        }
        if self.segment_thresh > MAX_SEGMENT_THRESH {
            return Err(ColumnConfigError::SegmentThreshTooLarge {
                value: self.segment_thresh,
                max: MAX_SEGMENT_THRESH,
            });
        }
        if self.skew_thresh == 0 {
            return Err(ColumnConfigError::ZeroSkewThresh);
        }
        if self.skew_thresh > MAX_SKEW_THRESH {
            return Err(ColumnConfigError::SkewThreshTooLarge {
                value: self.skew_thresh,
                max: MAX_SKEW_THRESH,
            });
        }
        Ok(())
    }

    /// Create a configuration with tiny thresholds for tests, so that even
    /// small inputs produce many segments and flushes.
    pub fn for_testing() -> Self {
        WriterConfig {
            skew_thresh: 4096,
            segment_thresh: 256,
        }
    }
}

/// Columnar writer configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnConfigError {
    /// Segment threshold is zero.
    #[error("segment threshold must be positive")]
    ZeroSegmentThresh,

    /// Segment threshold exceeds the maximum.
    #[error("segment threshold {value} exceeds maximum {max}")]
    SegmentThreshTooLarge {
        /// Requested threshold.
        value: usize,
        /// Largest accepted threshold.
        max: usize,
    },

    /// Skew threshold is zero.
    #[error("skew threshold must be positive")]
    ZeroSkewThresh,

    /// Skew threshold exceeds the maximum.
    #[error("skew threshold {value} exceeds maximum {max}")]
    SkewThreshTooLarge {
        /// Requested threshold.
        value: usize,
        /// Largest accepted threshold.
        max: usize,
    },
}

impl From<ColumnConfigError> for zed_core::Error {
    fn from(e: ColumnConfigError) -> Self {
        zed_core::Error::InvalidConfig(e.to_string())
    }
}
