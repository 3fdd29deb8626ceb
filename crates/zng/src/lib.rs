//! ZNG: the row-oriented binary stream of Zed values
//!
//! A stream is a sequence of frames. Types frames define local type IDs,
//! values frames carry `(local type id, element)` pairs, control frames carry
//! application messages, and an end-of-stream frame resets the local type
//! table so independently written streams can be concatenated.
//!
//! The columnar object format frames its reassembly section and trailer with
//! this encoding, and the journal writes every committed payload as a
//! complete stream.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod reader;
pub mod writer;

pub use frame::{FrameKind, DEFAULT_FRAME_THRESHOLD, MAX_FRAME_LEN};
pub use reader::{decode_all, Control, Reader};
pub use writer::{encode_all, Writer};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zed_core::{Context, Error, Field, Type, Value};

    fn record(ctx: &Context, a: i64, b: &str) -> Value {
        let typ = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::INT64),
                Field::new("b", Type::STRING),
            ])
            .unwrap();
        let mut body = Vec::new();
        zed_core::zcode::append(&mut body, Some(&zed_core::coding::encode_int(a)[..]));
        zed_core::zcode::append(&mut body, Some(b.as_bytes()));
        Value::new(typ, Some(body.into()))
    }

    #[test]
    fn test_round_trip_across_contexts() {
        let src = Context::new();
        let values = vec![
            record(&src, 1, "x"),
            Value::int64(7),
            Value::null(Type::STRING),
            record(&src, 2, "y"),
        ];
        let buf = encode_all(&values).unwrap();

        let dst = Arc::new(Context::new());
        let back = decode_all(dst.clone(), &buf).unwrap();
        assert_eq!(back.len(), 4);
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_string(), b.to_string());
            assert_eq!(a.typ().to_string(), b.typ().to_string());
        }
        assert_eq!(back[0].typ(), back[3].typ());
    }

    #[test]
    fn test_types_precede_values_across_flushes() {
        let ctx = Context::new();
        let mut w = Writer::with_threshold(Vec::new(), 8);
        for i in 0..20 {
            w.write_value(&record(&ctx, i, "v")).unwrap();
        }
        let buf = w.into_inner().unwrap();
        let back = decode_all(Arc::new(Context::new()), &buf).unwrap();
        assert_eq!(back.len(), 20);
        assert_eq!(back[19].deref("a").unwrap().as_int(), Some(19));
    }

    #[test]
    fn test_concatenated_streams() {
        let ctx = Context::new();
        let mut buf = encode_all(&[record(&ctx, 1, "a")]).unwrap();
        buf.extend(encode_all(&[Value::string("s"), record(&ctx, 2, "b")]).unwrap());
        let back = decode_all(Arc::new(Context::new()), &buf).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[2].deref("b").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn test_control_messages() {
        let mut w = Writer::new(Vec::new());
        w.write_value(&Value::int64(1)).unwrap();
        w.write_control(2, b"hello").unwrap();
        w.write_value(&Value::int64(2)).unwrap();
        let buf = w.into_inner().unwrap();

        let mut r = Reader::new(Arc::new(Context::new()), &buf[..]);
        assert_eq!(r.read_payload().unwrap().0, Some(Value::int64(1)));
        let (v, c) = r.read_payload().unwrap();
        assert!(v.is_none());
        let c = c.unwrap();
        assert_eq!(c.encoding, 2);
        assert_eq!(&c.bytes[..], b"hello");
        assert_eq!(r.read_value().unwrap(), Some(Value::int64(2)));
        assert_eq!(r.read_value().unwrap(), None);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut buf = encode_all(&[Value::int64(1)]).unwrap();
        buf.push(1);
        buf.push(5);
        assert!(matches!(
            decode_all(Arc::new(Context::new()), &buf),
            Err(Error::BadFormat(_))
        ));
    }

    #[test]
    fn test_undefined_type_id() {
        let mut buf = Vec::new();
        frame::append_frame(&mut buf, FrameKind::Values, &[40, 1]);
        assert!(matches!(
            decode_all(Arc::new(Context::new()), &buf),
            Err(Error::BadFormat(_))
        ));
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let buf = encode_all(&[Value::string(&"x".repeat(100))]).unwrap();
        let mut r = Reader::new(Arc::new(Context::new()), &buf[..]).with_max_frame(16);
        assert!(matches!(r.read_value(), Err(Error::BadFormat(_))));
    }
}
