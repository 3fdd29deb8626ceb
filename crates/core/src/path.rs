//! Dotted field paths

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A path through nested records, e.g. `a.b.c`.
///
/// The empty path denotes the value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path.
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    /// Build a path from its components.
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(components.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path. Empty components are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let parts: Vec<String> = s.split('.').map(str::to_string).collect();
        if parts.iter().any(String::is_empty) {
            return Err(Error::BadValue(format!("empty component in field path {:?}", s)));
        }
        Ok(FieldPath(parts))
    }

    /// The components.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path extended by one field.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut p = self.clone();
        p.0.push(name.into());
        p
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("this");
        }
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let p = FieldPath::parse("a.b.c").unwrap();
        assert_eq!(p.components(), &["a", "b", "c"]);
        assert_eq!(p.to_string(), "a.b.c");
        assert_eq!(FieldPath::parse("").unwrap(), FieldPath::root());
        assert_eq!(FieldPath::root().to_string(), "this");
    }

    #[test]
    fn test_parse_rejects_empty_component() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
    }

    #[test]
    fn test_prefix() {
        let a = FieldPath::new(["a"]);
        let ab = a.child("b");
        assert!(ab.starts_with(&a));
        assert!(!a.starts_with(&ab));
        assert_eq!("a.b".parse::<FieldPath>().unwrap(), ab);
    }
}
