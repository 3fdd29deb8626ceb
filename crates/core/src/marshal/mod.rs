//! Marshaling between Rust data and values
//!
//! [`to_value`] turns any `Serialize` type into a [`Value`] whose type is
//! interned in the given context. Structs become records in declaration
//! order, sequences become arrays (a union of element types when the
//! elements disagree), maps become normalized maps, `None` and `()` become
//! untyped nulls, unit variants become strings, and data-carrying variants
//! become single-field records named after the variant.
//!
//! [`from_value`] reverses the mapping and borrows strings and byte slices
//! directly from the value body.

mod de;
mod ser;

pub use de::Deserializer;
pub use ser::Serializer;

use crate::error::Result;
use crate::value::Value;
use crate::Context;
use serde::{Deserialize, Serialize};

/// Marshal `value` into a [`Value`] typed in `ctx`.
pub fn to_value<T: Serialize + ?Sized>(ctx: &Context, value: &T) -> Result<Value> {
    value.serialize(Serializer::new(ctx))
}

/// Unmarshal a `T` from `value`.
pub fn from_value<'de, T: Deserialize<'de>>(value: &'de Value) -> Result<T> {
    T::deserialize(Deserializer::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Flow {
        name: String,
        port: u16,
        tags: Vec<String>,
        origin: Option<Point>,
        weight: f64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Pair(i32, i32),
    }

    #[test]
    fn test_struct_round_trip() {
        let ctx = Context::new();
        let flow = Flow {
            name: "dns".into(),
            port: 53,
            tags: vec!["udp".into(), "internal".into()],
            origin: Some(Point { x: 1, y: -2 }),
            weight: 0.5,
        };
        let v = to_value(&ctx, &flow).unwrap();
        assert_eq!(
            v.typ().to_string(),
            "{name:string,port:uint16,tags:[string],origin:{x:int64,y:int64},weight:float64}"
        );
        let back: Flow = from_value(&v).unwrap();
        assert_eq!(back, flow);
    }

    #[test]
    fn test_none_is_untyped_null() {
        let ctx = Context::new();
        let flow = Flow {
            name: "x".into(),
            port: 1,
            tags: vec![],
            origin: None,
            weight: 1.0,
        };
        let v = to_value(&ctx, &flow).unwrap();
        assert_eq!(
            v.typ().to_string(),
            "{name:string,port:uint16,tags:[null],origin:null,weight:float64}"
        );
        let back: Flow = from_value(&v).unwrap();
        assert_eq!(back, flow);
    }

    #[test]
    fn test_same_shape_same_type() {
        let ctx = Context::new();
        let a = to_value(&ctx, &Point { x: 1, y: 2 }).unwrap();
        let b = to_value(&ctx, &Point { x: 3, y: 4 }).unwrap();
        assert_eq!(a.typ(), b.typ());
    }

    #[test]
    fn test_enum_variants() {
        let ctx = Context::new();
        let shapes = vec![
            Shape::Empty,
            Shape::Circle(2.0),
            Shape::Rect { w: 3, h: 4 },
            Shape::Pair(-1, 1),
        ];
        let v = to_value(&ctx, &shapes).unwrap();
        assert_eq!(
            v.typ().to_string(),
            "[(string,{Circle:float64},{Pair:[int32]},{Rect:{w:uint32,h:uint32}})]"
        );
        let back: Vec<Shape> = from_value(&v).unwrap();
        assert_eq!(back, shapes);
    }

    #[test]
    fn test_mixed_sequence_becomes_union() {
        let ctx = Context::new();
        let v = to_value(&ctx, &(1i64, "a", Option::<i64>::None)).unwrap();
        assert_eq!(v.typ().to_string(), "[(int64,string)]");
        assert_eq!(v.to_string(), "[1,\"a\",null]");
    }

    #[test]
    fn test_map_normalized() {
        let ctx = Context::new();
        let mut m = BTreeMap::new();
        m.insert("b".to_string(), 2u8);
        m.insert("a".to_string(), 1u8);
        let v = to_value(&ctx, &m).unwrap();
        assert_eq!(v.typ().to_string(), "|{string:uint8}|");
        assert_eq!(v.to_string(), "|{\"a\":1,\"b\":2}|");
        let back: BTreeMap<String, u8> = from_value(&v).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_borrowed_str() {
        let v = Value::string("zero copy");
        let s: &str = from_value(&v).unwrap();
        assert_eq!(s, "zero copy");
    }

    #[test]
    fn test_type_mismatch_reported() {
        let v = Value::string("nope");
        let err = from_value::<Point>(&v).unwrap_err();
        assert!(matches!(err, Error::Marshal(_)));
        let err = from_value::<Shape>(&Value::int64(1)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_integer_narrowing_checked() {
        let v = Value::int64(300);
        assert!(from_value::<u8>(&v).is_err());
        assert_eq!(from_value::<u16>(&v).unwrap(), 300);
    }
}
