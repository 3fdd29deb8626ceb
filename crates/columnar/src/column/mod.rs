//! Column trees
//!
//! Every distinct type written to an object gets a tree of columns shaped
//! after the type:
//!
//! | Kind | Columns |
//! |---|---|
//! | primitive, enum | one stream of tagged elements |
//! | record | one field column per field, each with a presence vector |
//! | array, set | lengths + elements |
//! | map | entry counts + keys + values |
//! | union | selectors + one column per member |
//! | named, error | the inner type's columns |
//!
//! Complex columns outside record fields (top level, elements, keys,
//! values, union members) sit under a `Nulls` node carrying a presence
//! vector, so null containers survive the round trip. Primitive columns
//! keep their nulls inline as null elements.

mod reader;
mod writer;

pub(crate) use reader::{ColumnReader, Source};
pub(crate) use writer::ColumnWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Spiller;
    use std::sync::Arc;
    use zed_core::zcode::{read_element, Builder};
    use zed_core::{to_value, CancellationToken, Context, Value};

    fn round_trip(values: &[Value]) -> Vec<Vec<u8>> {
        let typ = values[0].typ();
        let mut sp = Spiller::new(Vec::new(), 7);
        let mut w = ColumnWriter::new(typ, true);
        for v in values {
            w.write(v.bytes(), &mut sp).unwrap();
        }
        w.flush(true, &mut sp).unwrap();
        let meta = w.metadata();

        let src = Source {
            read_at: Arc::new(sp.sink),
            cancel: CancellationToken::new(),
        };
        let mut r = ColumnReader::new(typ, &meta, &src).unwrap();
        values
            .iter()
            .map(|_| {
                let mut b = Builder::new();
                r.read(&mut b).unwrap();
                b.take()
            })
            .collect()
    }

    fn element(v: &Value) -> Vec<u8> {
        zed_core::zcode::encode_element(v.bytes())
    }

    #[derive(serde::Serialize)]
    struct Row {
        id: u32,
        tags: Vec<String>,
        extra: Option<Vec<i64>>,
    }

    #[test]
    fn test_records_with_nulls() {
        let ctx = Context::new();
        let rows = vec![
            Row {
                id: 1,
                tags: vec!["a".into(), "bb".into()],
                extra: Some(vec![1, 2, 3]),
            },
            Row {
                id: 2,
                tags: vec!["c".into()],
                extra: Some(vec![-4]),
            },
        ];
        let mut values: Vec<Value> = rows.iter().map(|r| to_value(&ctx, r).unwrap()).collect();
        let typ = values[0].typ().clone();
        assert_eq!(values[1].typ(), &typ);

        // {id:3,tags:["z"],extra:null}
        let mut b = Builder::new();
        b.append(Some(&zed_core::coding::encode_uint(3)[..]));
        b.begin_container();
        b.append(Some(&b"z"[..]));
        b.end_container();
        b.append(None);
        values.push(Value::new(typ.clone(), Some(b.take().into())));
        values.push(Value::null(typ));
        let out = round_trip(&values);
        for (v, got) in values.iter().zip(&out) {
            assert_eq!(&element(v), got);
            let (body, _) = read_element(got).unwrap();
            assert_eq!(body, v.bytes());
        }
    }

    #[test]
    fn test_union_and_map() {
        let ctx = Context::new();
        let mixed: Vec<Value> = vec![
            to_value(&ctx, &(1i64, "x", Option::<i64>::None)).unwrap(),
            to_value(&ctx, &(2i64, "y", Option::<i64>::None)).unwrap(),
        ];
        for (v, got) in mixed.iter().zip(round_trip(&mixed)) {
            assert_eq!(element(v), got);
        }

        let mut m = std::collections::BTreeMap::new();
        m.insert("k1", vec![1u8]);
        m.insert("k2", vec![]);
        let maps = vec![to_value(&ctx, &m).unwrap()];
        for (v, got) in maps.iter().zip(round_trip(&maps)) {
            assert_eq!(element(v), got);
        }
    }

    #[test]
    fn test_metadata_type_mismatch() {
        let ctx = Context::new();
        let v = to_value(&ctx, &vec![1i64]).unwrap();
        let mut sp = Spiller::new(Vec::new(), 64);
        let mut w = ColumnWriter::new(v.typ(), true);
        w.write(v.bytes(), &mut sp).unwrap();
        w.flush(true, &mut sp).unwrap();
        let meta = w.metadata();
        let src = Source {
            read_at: Arc::new(sp.sink),
            cancel: CancellationToken::new(),
        };
        assert!(ColumnReader::new(&zed_core::Type::INT64, &meta, &src).is_err());
    }
}
