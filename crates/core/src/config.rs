//! Type context configuration.
//!
//! Caps bound the size of any single type a context will intern, so a
//! crafted type-value cannot make decoding allocate without limit.

/// Type context configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Maximum fields in one record type (default: 100 000).
    pub max_record_fields: usize,

    /// Maximum members in one union type (default: 100 000).
    pub max_union_types: usize,

    /// Maximum symbols in one enum type (default: 100 000).
    pub max_enum_symbols: usize,

    /// Maximum nesting depth while decoding a type-value (default: 512).
    pub max_decode_depth: usize,
}

/// Default cap on fields, union members and enum symbols.
pub const DEFAULT_TYPE_CAP: usize = 100_000;

/// Default type-value decode depth.
pub const DEFAULT_DECODE_DEPTH: usize = 512;

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            max_record_fields: DEFAULT_TYPE_CAP,
            max_union_types: DEFAULT_TYPE_CAP,
            max_enum_symbols: DEFAULT_TYPE_CAP,
            max_decode_depth: DEFAULT_DECODE_DEPTH,
        }
    }
}

impl ContextConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record field cap (builder pattern).
    pub fn with_max_record_fields(mut self, n: usize) -> Self {
        self.max_record_fields = n;
        self
    }

    /// Set the union member cap (builder pattern).
    pub fn with_max_union_types(mut self, n: usize) -> Self {
        self.max_union_types = n;
        self
    }

    /// Set the enum symbol cap (builder pattern).
    pub fn with_max_enum_symbols(mut self, n: usize) -> Self {
        self.max_enum_symbols = n;
        self
    }

    /// Set the decode depth limit (builder pattern).
    pub fn with_max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ContextConfigError> {
        if self.max_record_fields == 0 || self.max_union_types == 0 || self.max_enum_symbols == 0 {
            return Err(ContextConfigError::ZeroCap);
        }
        if self.max_decode_depth == 0 {
            return Err(ContextConfigError::ZeroDepth);
        }
        Ok(())
    }

    /// Create a configuration with small caps for tests.
    pub fn for_testing() -> Self {
        ContextConfig {
            max_record_fields: 64,
            max_union_types: 64,
            max_enum_symbols: 64,
            max_decode_depth: 16,
        }
    }
}

/// Type context configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextConfigError {
    /// A count cap is zero.
    #[error("type caps must be at least 1")]
    ZeroCap,

    /// The decode depth limit is zero.
    #[error("decode depth limit must be at least 1")]
    ZeroDepth,
}

impl From<ContextConfigError> for crate::Error {
    fn from(e: ContextConfigError) -> Self {
        crate::Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.max_record_fields, 100_000);
        assert_eq!(config.max_decode_depth, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ContextConfig::new()
            .with_max_record_fields(10)
            .with_max_union_types(11)
            .with_max_enum_symbols(12)
            .with_max_decode_depth(13);
        assert_eq!(config.max_record_fields, 10);
        assert_eq!(config.max_union_types, 11);
        assert_eq!(config.max_enum_symbols, 12);
        assert_eq!(config.max_decode_depth, 13);
    }

    #[test]
    fn test_validation_zero() {
        assert_eq!(
            ContextConfig::new().with_max_enum_symbols(0).validate(),
            Err(ContextConfigError::ZeroCap)
        );
        assert_eq!(
            ContextConfig::new().with_max_decode_depth(0).validate(),
            Err(ContextConfigError::ZeroDepth)
        );
    }

    #[test]
    fn test_testing_config() {
        let config = ContextConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.max_decode_depth < ContextConfig::default().max_decode_depth);
    }
}
