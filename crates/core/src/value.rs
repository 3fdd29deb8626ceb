//! Values
//!
//! A [`Value`] pairs a type with an optional zcode body. `None` is null,
//! which is distinct from a present zero-length body. Bodies are shared
//! `bytes::Bytes`, so sub-values (record fields, array elements) are
//! zero-copy slices of their parent.

use crate::coding;
use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::types::{PrimitiveType, Type};
use crate::typevalue::{format_type_value, quote};
use crate::zcode::Iter;
use crate::Context;
use bytes::Bytes;
use std::fmt;
use std::net::IpAddr;

/// A typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    typ: Type,
    bytes: Option<Bytes>,
}

impl Value {
    /// Create a value from a type and body.
    pub fn new(typ: Type, bytes: Option<Bytes>) -> Self {
        Value { typ, bytes }
    }

    /// Create a value by copying `body`.
    pub fn from_slice(typ: Type, body: Option<&[u8]>) -> Self {
        Value::new(typ, body.map(Bytes::copy_from_slice))
    }

    /// A null of the given type.
    pub fn null(typ: Type) -> Self {
        Value { typ, bytes: None }
    }

    /// A null of type `null`.
    pub fn null_value() -> Self {
        Value::null(Type::NULL)
    }

    /// An unsigned integer of the given width.
    pub fn uint(p: PrimitiveType, v: u64) -> Self {
        debug_assert!(p.is_unsigned());
        Value::new(Type::Primitive(p), Some(coding::encode_uint(v).into()))
    }

    /// A signed integer, duration or time.
    pub fn int(p: PrimitiveType, v: i64) -> Self {
        debug_assert!(p.is_signed());
        Value::new(Type::Primitive(p), Some(coding::encode_int(v).into()))
    }

    /// A `uint64`.
    pub fn uint64(v: u64) -> Self {
        Value::uint(PrimitiveType::Uint64, v)
    }

    /// An `int64`.
    pub fn int64(v: i64) -> Self {
        Value::int(PrimitiveType::Int64, v)
    }

    /// A `duration` in nanoseconds.
    pub fn duration(nanos: i64) -> Self {
        Value::int(PrimitiveType::Duration, nanos)
    }

    /// A `time` in nanoseconds since the Unix epoch.
    pub fn time(nanos: i64) -> Self {
        Value::int(PrimitiveType::Time, nanos)
    }

    /// A `float16`.
    pub fn float16(v: f32) -> Self {
        Value::new(Type::Primitive(PrimitiveType::Float16), Some(coding::encode_float16(v).into()))
    }

    /// A `float32`.
    pub fn float32(v: f32) -> Self {
        Value::new(Type::Primitive(PrimitiveType::Float32), Some(coding::encode_float32(v).into()))
    }

    /// A `float64`.
    pub fn float64(v: f64) -> Self {
        Value::new(Type::FLOAT64, Some(coding::encode_float64(v).into()))
    }

    /// A `decimal` from its opaque encoding.
    pub fn decimal(body: &[u8]) -> Self {
        Value::from_slice(Type::Primitive(PrimitiveType::Decimal), Some(body))
    }

    /// A `bool`.
    pub fn bool(v: bool) -> Self {
        Value::new(Type::BOOL, Some(coding::encode_bool(v).into()))
    }

    /// A `bytes` value.
    pub fn from_bytes(b: &[u8]) -> Self {
        Value::from_slice(Type::BYTES, Some(b))
    }

    /// A `string`.
    pub fn string(s: &str) -> Self {
        Value::from_slice(Type::STRING, Some(s.as_bytes()))
    }

    /// An `ip`.
    pub fn ip(ip: IpAddr) -> Self {
        Value::new(Type::Primitive(PrimitiveType::Ip), Some(coding::encode_ip(ip).into()))
    }

    /// A `net`.
    pub fn net(ip: IpAddr, prefix: u8) -> Result<Self> {
        Ok(Value::new(
            Type::Primitive(PrimitiveType::Net),
            Some(coding::encode_net(ip, prefix)?.into()),
        ))
    }

    /// A `type` value holding the canonical type-value of `typ`.
    pub fn type_value(ctx: &Context, typ: &Type) -> Self {
        Value::new(Type::Primitive(PrimitiveType::Type), Some(ctx.type_value(typ)))
    }

    /// An `error` primitive carrying `message`.
    pub fn error_primitive(message: &str) -> Self {
        Value::from_slice(Type::Primitive(PrimitiveType::Error), Some(message.as_bytes()))
    }

    /// The type.
    pub fn typ(&self) -> &Type {
        &self.typ
    }

    /// The body, or `None` for null.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// The shared body, or `None` for null.
    pub fn shared_bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    /// Split into type and body.
    pub fn into_parts(self) -> (Type, Option<Bytes>) {
        (self.typ, self.bytes)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// Whether the value is of an error type.
    pub fn is_error(&self) -> bool {
        matches!(self.typ.under(), Type::Error(_))
    }

    /// The value as a signed integer (int8..int64, duration, time).
    pub fn as_int(&self) -> Option<i64> {
        match self.typ.primitive()? {
            p if p.is_signed() => coding::decode_int(self.bytes()?).ok(),
            _ => None,
        }
    }

    /// The value as an unsigned integer (uint8..uint64).
    pub fn as_uint(&self) -> Option<u64> {
        match self.typ.primitive()? {
            p if p.is_unsigned() => coding::decode_uint(self.bytes()?).ok(),
            _ => None,
        }
    }

    /// The value as a float (float16, float32, float64).
    pub fn as_float(&self) -> Option<f64> {
        let body = self.bytes()?;
        match self.typ.primitive()? {
            PrimitiveType::Float16 => coding::decode_float16(body).ok().map(f64::from),
            PrimitiveType::Float32 => coding::decode_float32(body).ok().map(f64::from),
            PrimitiveType::Float64 => coding::decode_float64(body).ok(),
            _ => None,
        }
    }

    /// The value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self.typ.primitive()? {
            PrimitiveType::Bool => coding::decode_bool(self.bytes()?).ok(),
            _ => None,
        }
    }

    /// The value as a string (string or error primitive).
    pub fn as_str(&self) -> Option<&str> {
        match self.typ.primitive()? {
            PrimitiveType::String | PrimitiveType::Error => {
                std::str::from_utf8(self.bytes()?).ok()
            }
            _ => None,
        }
    }

    /// The body of any non-null value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.bytes()
    }

    /// The named field of a record value.
    ///
    /// A null record yields a null of the field's type. Named types are
    /// looked through; error values are not. Returns `None` when the value
    /// is not a record or has no such field.
    pub fn deref(&self, field: &str) -> Option<Value> {
        let rec = self.typ.record()?;
        let idx = rec.index_of(field)?;
        let ftyp = rec.fields[idx].typ.clone();
        let body = match &self.bytes {
            None => return Some(Value::null(ftyp)),
            Some(b) => b,
        };
        let mut it = Iter::new(body);
        for _ in 0..idx {
            it.try_next().ok()?;
        }
        let elem = it.try_next().ok()?;
        Some(Value::new(ftyp, elem.map(|e| body.slice_ref(e))))
    }

    /// Follow `path` through nested records.
    pub fn deref_path(&self, path: &FieldPath) -> Option<Value> {
        let mut v = self.clone();
        for name in path.components() {
            v = v.deref(name)?;
        }
        Some(v)
    }

    /// Render the value as text, reporting malformed bodies.
    pub fn format(&self) -> Result<String> {
        let mut out = String::new();
        format_value(&mut out, &self.typ, self.bytes())?;
        Ok(out)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "<{}>", e),
        }
    }
}

fn format_value(out: &mut String, typ: &Type, body: Option<&[u8]>) -> Result<()> {
    use std::fmt::Write as _;

    let body = match body {
        None => {
            out.push_str("null");
            return Ok(());
        }
        Some(b) => b,
    };
    match typ {
        Type::Primitive(p) => format_primitive(out, *p, body)?,
        Type::Record(r) => {
            out.push('{');
            let mut it = Iter::new(body);
            for (i, field) in r.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", quote(&field.name));
                format_value(out, &field.typ, it.try_next()?)?;
            }
            out.push('}');
        }
        Type::Array(a) => format_elements(out, "[", "]", &a.typ, body)?,
        Type::Set(s) => format_elements(out, "|[", "]|", &s.typ, body)?,
        Type::Map(m) => {
            out.push_str("|{");
            let mut it = Iter::new(body);
            let mut first = true;
            while !it.done() {
                if !first {
                    out.push(',');
                }
                first = false;
                format_value(out, &m.key, it.try_next()?)?;
                out.push(':');
                format_value(out, &m.value, it.try_next()?)?;
            }
            out.push_str("}|");
        }
        Type::Union(u) => {
            let (member, inner) = union_parts(&u.types, body)?;
            format_value(out, member, inner)?;
        }
        Type::Enum(e) => {
            let sel = coding::decode_uint(body)?;
            let sym = e
                .symbols
                .get(sel as usize)
                .ok_or_else(|| Error::out_of_range("enum selector", sel))?;
            out.push_str(&quote(sym));
        }
        Type::Named(n) => format_value(out, &n.typ, Some(body))?,
        Type::Error(e) => {
            out.push_str("error(");
            format_value(out, &e.typ, Some(body))?;
            out.push(')');
        }
    }
    Ok(())
}

fn format_elements(
    out: &mut String,
    open: &str,
    close: &str,
    typ: &Type,
    body: &[u8],
) -> Result<()> {
    out.push_str(open);
    let mut it = Iter::new(body);
    let mut first = true;
    while !it.done() {
        if !first {
            out.push(',');
        }
        first = false;
        format_value(out, typ, it.try_next()?)?;
    }
    out.push_str(close);
    Ok(())
}

/// Split a union body into the selected member type and its body.
pub(crate) fn union_parts<'t, 'b>(
    types: &'t [Type],
    body: &'b [u8],
) -> Result<(&'t Type, Option<&'b [u8]>)> {
    let mut it = Iter::new(body);
    let sel = it
        .try_next()?
        .ok_or_else(|| Error::BadValue("null union selector".into()))?;
    let sel = coding::decode_uint(sel)?;
    let member = types
        .get(sel as usize)
        .ok_or_else(|| Error::out_of_range("union selector", sel))?;
    Ok((member, it.try_next()?))
}

fn format_primitive(out: &mut String, p: PrimitiveType, body: &[u8]) -> Result<()> {
    use std::fmt::Write as _;

    match p {
        p if p.is_unsigned() => {
            let _ = write!(out, "{}", coding::decode_uint(body)?);
        }
        PrimitiveType::Duration => out.push_str(&coding::format_duration(coding::decode_int(body)?)),
        PrimitiveType::Time => out.push_str(&coding::format_time(coding::decode_int(body)?)),
        p if p.is_signed() => {
            let _ = write!(out, "{}", coding::decode_int(body)?);
        }
        PrimitiveType::Float16 => {
            let _ = write!(out, "{:?}", coding::decode_float16(body)?);
        }
        PrimitiveType::Float32 => {
            let _ = write!(out, "{:?}", coding::decode_float32(body)?);
        }
        PrimitiveType::Float64 => {
            let _ = write!(out, "{:?}", coding::decode_float64(body)?);
        }
        PrimitiveType::Bool => {
            let _ = write!(out, "{}", coding::decode_bool(body)?);
        }
        PrimitiveType::Bytes | PrimitiveType::Decimal => {
            out.push_str("0x");
            for b in body {
                let _ = write!(out, "{:02x}", b);
            }
        }
        PrimitiveType::String => {
            let s = std::str::from_utf8(body)
                .map_err(|_| Error::BadValue("invalid UTF-8 in string".into()))?;
            let _ = write!(out, "{:?}", s);
        }
        PrimitiveType::Error => {
            let _ = write!(out, "error({:?})", String::from_utf8_lossy(body));
        }
        PrimitiveType::Ip => {
            let _ = write!(out, "{}", coding::decode_ip(body)?);
        }
        PrimitiveType::Net => {
            let (ip, prefix) = coding::decode_net(body)?;
            let _ = write!(out, "{}/{}", ip, prefix);
        }
        PrimitiveType::Type => {
            let _ = write!(out, "<{}>", format_type_value(body)?);
        }
        PrimitiveType::Null => out.push_str("null"),
        // every unsigned and signed ID is matched by the guards above
        _ => unreachable!("integer primitive {}", p),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;
    use crate::zcode::Builder;

    fn xy_record(ctx: &Context) -> Type {
        ctx.lookup_type_record(vec![Field::new("x", Type::INT64), Field::new("s", Type::STRING)])
            .unwrap()
    }

    fn xy_value(typ: &Type, x: i64, s: &str) -> Value {
        let mut b = Builder::new();
        b.append(Some(&coding::encode_int(x)[..]));
        b.append(Some(s.as_bytes()));
        Value::new(typ.clone(), Some(b.take().into()))
    }

    #[test]
    fn test_null_distinct_from_empty() {
        let empty = Value::string("");
        let null = Value::null(Type::STRING);
        assert_ne!(empty, null);
        assert!(null.is_null());
        assert_eq!(empty.bytes(), Some(&b""[..]));
    }

    #[test]
    fn test_primitive_accessors() {
        assert_eq!(Value::int64(-5).as_int(), Some(-5));
        assert_eq!(Value::uint64(5).as_uint(), Some(5));
        assert_eq!(Value::int64(5).as_uint(), None);
        assert_eq!(Value::float64(2.5).as_float(), Some(2.5));
        assert_eq!(Value::float16(0.5).as_float(), Some(0.5));
        assert_eq!(Value::bool(true).as_bool(), Some(true));
        assert_eq!(Value::string("hi").as_str(), Some("hi"));
        assert_eq!(Value::time(7).as_int(), Some(7));
        assert_eq!(Value::null(Type::INT64).as_int(), None);
    }

    #[test]
    fn test_deref() {
        let ctx = Context::new();
        let typ = xy_record(&ctx);
        let v = xy_value(&typ, 1, "a");
        assert_eq!(v.deref("x").unwrap().as_int(), Some(1));
        assert_eq!(v.deref("s").unwrap().as_str(), Some("a"));
        assert!(v.deref("nope").is_none());

        let null = Value::null(typ);
        let x = null.deref("x").unwrap();
        assert!(x.is_null());
        assert_eq!(x.typ(), &Type::INT64);
    }

    #[test]
    fn test_deref_path_through_named() {
        let ctx = Context::new();
        let inner = xy_record(&ctx);
        let named = ctx.lookup_type_named("point", inner.clone()).unwrap();
        let outer = ctx
            .lookup_type_record(vec![Field::new("p", named)])
            .unwrap();
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(&coding::encode_int(3)[..]));
        b.append(Some(&b"z"[..]));
        b.end_container();
        let v = Value::new(outer, Some(b.take().into()));
        let x = v.deref_path(&FieldPath::parse("p.x").unwrap()).unwrap();
        assert_eq!(x.as_int(), Some(3));
        assert!(v.deref_path(&FieldPath::parse("p.q").unwrap()).is_none());
        assert_eq!(v.deref_path(&FieldPath::root()), Some(v.clone()));
    }

    #[test]
    fn test_deref_stops_at_error_wrapper() {
        let ctx = Context::new();
        let typ = xy_record(&ctx);
        let v = xy_value(&typ, 1, "a");
        let err = Value::new(ctx.lookup_type_error(typ), v.shared_bytes().cloned());
        assert!(err.is_error());
        assert!(err.deref("x").is_none());
        assert!(err.deref_path(&FieldPath::parse("x").unwrap()).is_none());
    }

    #[test]
    fn test_display() {
        let ctx = Context::new();
        let typ = xy_record(&ctx);
        assert_eq!(xy_value(&typ, 1, "a").to_string(), "{x:1,s:\"a\"}");
        assert_eq!(Value::null(typ).to_string(), "null");

        let arr = ctx.lookup_type_array(Type::INT64);
        let mut b = Builder::new();
        b.append(Some(&coding::encode_int(1)[..]));
        b.append(Some(&coding::encode_int(2)[..]));
        assert_eq!(Value::new(arr, Some(b.take().into())).to_string(), "[1,2]");

        let set = ctx.lookup_type_set(Type::STRING);
        let mut b = Builder::new();
        b.append(Some(&b"a"[..]));
        assert_eq!(Value::new(set, Some(b.take().into())).to_string(), "|[\"a\"]|");

        assert_eq!(ctx.new_error("x").to_string(), "error(\"x\")");
        assert_eq!(Value::time(0).to_string(), "1970-01-01T00:00:00Z");
        assert_eq!(Value::from_bytes(&[0xab, 1]).to_string(), "0xab01");
        assert_eq!(
            Value::type_value(&ctx, &Type::STRING).to_string(),
            "<string>"
        );
        assert_eq!(
            Value::net("10.0.0.0".parse().unwrap(), 8).unwrap().to_string(),
            "10.0.0.0/8"
        );
    }

    #[test]
    fn test_display_union_and_enum() {
        let ctx = Context::new();
        let u = ctx
            .lookup_type_union(vec![Type::STRING, Type::INT64])
            .unwrap();
        let mut b = Builder::new();
        b.append(Some(&coding::encode_uint(1)[..]));
        b.append(Some(&b"s"[..]));
        assert_eq!(Value::new(u, Some(b.take().into())).to_string(), "\"s\"");

        let e = ctx
            .lookup_type_enum(vec!["red".into(), "green".into()])
            .unwrap();
        let v = Value::new(e.clone(), Some(coding::encode_uint(1).into()));
        assert_eq!(v.to_string(), "green");
        let bad = Value::new(e, Some(coding::encode_uint(9).into()));
        assert!(bad.format().is_err());
    }

    #[test]
    fn test_malformed_record_reports_error() {
        let ctx = Context::new();
        let typ = xy_record(&ctx);
        let v = Value::new(typ, Some(Bytes::from_static(&[2, 2])));
        assert!(v.format().is_err());
    }
}
