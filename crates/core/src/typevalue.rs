//! Canonical type-value encoding
//!
//! Every type serializes to a self-contained byte sequence: one tag byte
//! followed by a tag-specific body. Tags `0..23` are the primitive IDs and
//! carry no body.
//!
//! ```text
//! 23 NameDef  uvarint len, name, type-value
//! 24 NameRef  uvarint len, name
//! 25 Record   uvarint count, { uvarint len, name, type-value }*
//! 26 Array    type-value
//! 27 Set      type-value
//! 28 Union    uvarint count, type-value*
//! 29 Enum     uvarint count, { uvarint len, symbol }*
//! 30 Map      key type-value, value type-value
//! 31 Error    type-value
//! ```
//!
//! The encoder is context free. Decoding into interned types lives on
//! [`Context`](crate::Context); [`format_type_value`] renders a type-value
//! as text without interning anything.

use crate::error::{Result, TypeValueError};
use crate::types::{Field, PrimitiveType, Type, ID_RESERVED};
use crate::zcode::{append_uvarint, uvarint};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;

/// Named type definition.
pub const TAG_NAME_DEF: u8 = 23;
/// Reference to a name defined earlier in the same type-value.
pub const TAG_NAME_REF: u8 = 24;
/// Record type.
pub const TAG_RECORD: u8 = 25;
/// Array type.
pub const TAG_ARRAY: u8 = 26;
/// Set type.
pub const TAG_SET: u8 = 27;
/// Union type.
pub const TAG_UNION: u8 = 28;
/// Enum type.
pub const TAG_ENUM: u8 = 29;
/// Map type.
pub const TAG_MAP: u8 = 30;
/// Error type.
pub const TAG_ERROR: u8 = 31;

/// Encode `typ` as its canonical type-value.
pub fn encode_type_value(typ: &Type) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.typ(typ);
    enc.finish()
}

/// Builds one canonical type-value.
///
/// A named type already defined earlier in the same type-value, with the
/// same binding, is emitted as a `NameRef`.
#[derive(Default)]
pub(crate) struct Encoder {
    out: Vec<u8>,
    names: FxHashMap<String, Type>,
}

impl Encoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.out
    }

    fn name(&mut self, name: &str) {
        append_uvarint(&mut self.out, name.len() as u64);
        self.out.extend_from_slice(name.as_bytes());
    }

    pub(crate) fn typ(&mut self, typ: &Type) {
        match typ {
            Type::Primitive(p) => self.out.push(p.id()),
            Type::Record(r) => self.record(&r.fields),
            Type::Array(a) => self.array(&a.typ),
            Type::Set(s) => self.set(&s.typ),
            Type::Map(m) => self.map(&m.key, &m.value),
            Type::Union(u) => self.union(&u.types),
            Type::Enum(e) => self.enumeration(&e.symbols),
            Type::Named(n) => {
                if self.names.get(&n.name) == Some(typ) {
                    self.out.push(TAG_NAME_REF);
                    self.name(&n.name);
                } else {
                    self.named(&n.name, &n.typ);
                    self.names.insert(n.name.clone(), typ.clone());
                }
            }
            Type::Error(e) => self.error(&e.typ),
        }
    }

    pub(crate) fn record(&mut self, fields: &[Field]) {
        self.out.push(TAG_RECORD);
        append_uvarint(&mut self.out, fields.len() as u64);
        for f in fields {
            self.name(&f.name);
            self.typ(&f.typ);
        }
    }

    pub(crate) fn array(&mut self, inner: &Type) {
        self.out.push(TAG_ARRAY);
        self.typ(inner);
    }

    pub(crate) fn set(&mut self, inner: &Type) {
        self.out.push(TAG_SET);
        self.typ(inner);
    }

    pub(crate) fn map(&mut self, key: &Type, value: &Type) {
        self.out.push(TAG_MAP);
        self.typ(key);
        self.typ(value);
    }

    pub(crate) fn union(&mut self, types: &[Type]) {
        self.out.push(TAG_UNION);
        append_uvarint(&mut self.out, types.len() as u64);
        for t in types {
            self.typ(t);
        }
    }

    pub(crate) fn enumeration(&mut self, symbols: &[String]) {
        self.out.push(TAG_ENUM);
        append_uvarint(&mut self.out, symbols.len() as u64);
        for s in symbols {
            self.name(s);
        }
    }

    pub(crate) fn named(&mut self, name: &str, inner: &Type) {
        self.out.push(TAG_NAME_DEF);
        self.name(name);
        self.typ(inner);
    }

    pub(crate) fn error(&mut self, inner: &Type) {
        self.out.push(TAG_ERROR);
        self.typ(inner);
    }
}

/// Cursor over a type-value, shared by the context decoder and the formatter.
pub(crate) struct Cursor<'a> {
    pub(crate) buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Cursor { buf }
    }

    pub(crate) fn byte(&mut self) -> Result<u8> {
        let (&b, rest) = self.buf.split_first().ok_or(TypeValueError::Truncated)?;
        self.buf = rest;
        Ok(b)
    }

    pub(crate) fn uvarint(&mut self) -> Result<u64> {
        let (v, n) = uvarint(self.buf).ok_or(TypeValueError::Truncated)?;
        self.buf = &self.buf[n..];
        Ok(v)
    }

    /// A count bounded by `limit`.
    pub(crate) fn count(&mut self, what: &'static str, limit: usize) -> Result<usize> {
        let n = self.uvarint()?;
        if n > limit as u64 {
            return Err(TypeValueError::CapExceeded {
                what,
                count: n,
                limit,
            }
            .into());
        }
        Ok(n as usize)
    }

    pub(crate) fn string(&mut self) -> Result<&'a str> {
        let n = self.uvarint()?;
        if n > self.buf.len() as u64 {
            return Err(TypeValueError::Truncated.into());
        }
        let (s, rest) = self.buf.split_at(n as usize);
        self.buf = rest;
        Ok(std::str::from_utf8(s).map_err(|_| TypeValueError::InvalidUtf8)?)
    }
}

/// Render a type-value as text without interning it.
///
/// Name references resolve only against definitions earlier in the same
/// type-value; an unresolved reference renders as the bare name.
pub fn format_type_value(tv: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut cur = Cursor::new(tv);
    format_one(&mut cur, &mut out, 0)?;
    if !cur.buf.is_empty() {
        return Err(TypeValueError::TrailingBytes(cur.buf.len()).into());
    }
    Ok(out)
}

const FORMAT_DEPTH_LIMIT: usize = 512;

fn format_one(cur: &mut Cursor<'_>, out: &mut String, depth: usize) -> Result<()> {
    if depth > FORMAT_DEPTH_LIMIT {
        return Err(TypeValueError::DepthLimit(FORMAT_DEPTH_LIMIT).into());
    }
    let tag = cur.byte()?;
    match tag {
        ID_RESERVED => return Err(TypeValueError::ReservedPrimitive(tag).into()),
        0..=22 => {
            let p = PrimitiveType::from_id(tag).ok_or(TypeValueError::ReservedPrimitive(tag))?;
            out.push_str(p.name());
        }
        TAG_NAME_DEF => {
            let name = cur.string()?;
            let _ = write!(out, "{}=(", quote(name));
            format_one(cur, out, depth + 1)?;
            out.push(')');
        }
        TAG_NAME_REF => out.push_str(&quote(cur.string()?)),
        TAG_RECORD => {
            let n = cur.count("record field", usize::MAX)?;
            out.push('{');
            for i in 0..n {
                if i > 0 {
                    out.push(',');
                }
                let name = cur.string()?;
                let _ = write!(out, "{}:", quote(name));
                format_one(cur, out, depth + 1)?;
            }
            out.push('}');
        }
        TAG_ARRAY => {
            out.push('[');
            format_one(cur, out, depth + 1)?;
            out.push(']');
        }
        TAG_SET => {
            out.push_str("|[");
            format_one(cur, out, depth + 1)?;
            out.push_str("]|");
        }
        TAG_MAP => {
            out.push_str("|{");
            format_one(cur, out, depth + 1)?;
            out.push(':');
            format_one(cur, out, depth + 1)?;
            out.push_str("}|");
        }
        TAG_UNION => {
            let n = cur.count("union member", usize::MAX)?;
            out.push('(');
            for i in 0..n {
                if i > 0 {
                    out.push(',');
                }
                format_one(cur, out, depth + 1)?;
            }
            out.push(')');
        }
        TAG_ENUM => {
            let n = cur.count("enum symbol", usize::MAX)?;
            out.push_str("enum(");
            for i in 0..n {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(cur.string()?));
            }
            out.push(')');
        }
        TAG_ERROR => {
            out.push_str("error(");
            format_one(cur, out, depth + 1)?;
            out.push(')');
        }
        other => return Err(TypeValueError::UnknownTag(other).into()),
    }
    Ok(())
}

/// A name as it appears in text: bare when it is an identifier, quoted otherwise.
pub(crate) fn quote(name: &str) -> String {
    struct Name<'a>(&'a str);
    impl std::fmt::Display for Name<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            crate::types::write_name(f, self.0)
        }
    }
    Name(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeArray, TypeNamed, TypeRecord};
    use std::sync::Arc;

    #[test]
    fn test_primitive_is_single_byte() {
        assert_eq!(encode_type_value(&Type::INT64), vec![7]);
        assert_eq!(encode_type_value(&Type::NULL), vec![22]);
    }

    #[test]
    fn test_record_encoding() {
        let rec = Type::Record(Arc::new(TypeRecord {
            id: 23,
            fields: vec![Field::new("x", Type::INT64)],
        }));
        assert_eq!(encode_type_value(&rec), vec![TAG_RECORD, 1, 1, b'x', 7]);
    }

    #[test]
    fn test_repeated_name_becomes_ref() {
        let port = Type::Named(Arc::new(TypeNamed {
            id: 23,
            name: "port".into(),
            typ: Type::Primitive(PrimitiveType::Uint16),
        }));
        let rec = Type::Record(Arc::new(TypeRecord {
            id: 24,
            fields: vec![Field::new("a", port.clone()), Field::new("b", port)],
        }));
        let tv = encode_type_value(&rec);
        assert_eq!(
            tv,
            vec![
                TAG_RECORD, 2, 1, b'a', TAG_NAME_DEF, 4, b'p', b'o', b'r', b't', 1, 1, b'b',
                TAG_NAME_REF, 4, b'p', b'o', b'r', b't'
            ]
        );
        assert_eq!(
            format_type_value(&tv).unwrap(),
            "{a:port=(uint16),b:port}"
        );
    }

    #[test]
    fn test_format_nested() {
        let arr = Type::Array(Arc::new(TypeArray {
            id: 23,
            typ: Type::STRING,
        }));
        let tv = encode_type_value(&arr);
        assert_eq!(format_type_value(&tv).unwrap(), "[string]");
    }

    #[test]
    fn test_format_rejects_bad_input() {
        assert!(format_type_value(&[ID_RESERVED]).is_err());
        assert!(format_type_value(&[99]).is_err());
        assert!(format_type_value(&[TAG_ARRAY]).is_err());
        assert!(format_type_value(&[7, 7]).is_err());
    }
}
