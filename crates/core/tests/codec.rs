use std::sync::Arc;
use zed_core::zcode::{Builder, Iter};
use zed_core::{
    coding, copy, encode_type_value, format_type_value, Arena, ArenaPool, Context, Field,
    IterReader, Puller, ReaderPuller, Type, Value,
};

fn nested_type(ctx: &Context) -> Type {
    let point = ctx
        .lookup_type_record(vec![Field::new("x", Type::INT64), Field::new("y", Type::INT64)])
        .unwrap();
    let named = ctx.lookup_type_named("point", point).unwrap();
    let tags = ctx.lookup_type_set(Type::STRING);
    let either = ctx
        .lookup_type_union(vec![Type::STRING, ctx.lookup_type_array(named.clone())])
        .unwrap();
    ctx.lookup_type_record(vec![
        Field::new("origin", named),
        Field::new("tags", tags),
        Field::new("either", either),
    ])
    .unwrap()
}

#[test]
fn test_type_value_translates_across_contexts() {
    let a = Context::new();
    let typ = nested_type(&a);
    let tv = encode_type_value(&typ);

    let b = Context::new();
    // a few unrelated types first so IDs differ between contexts
    b.lookup_type_array(Type::BOOL);
    b.lookup_type_map(Type::STRING, Type::FLOAT64);
    let (translated, rest) = b.decode_type_value(&tv).unwrap();
    assert!(rest.is_empty());
    assert_eq!(translated.to_string(), typ.to_string());
    assert_ne!(translated.id(), typ.id());
    assert_eq!(b.translate(&typ).unwrap(), translated);
    assert_eq!(
        format_type_value(&tv).unwrap(),
        format_type_value(&encode_type_value(&translated)).unwrap()
    );
}

#[test]
fn test_arena_values_survive_clone_to() {
    let ctx = Context::new();
    let pair = ctx
        .lookup_type_record(vec![Field::new("a", Type::STRING), Field::new("b", Type::INT64)])
        .unwrap();

    let pool = ArenaPool::new();
    let mut src = pool.arena();
    let a = src.new_value(&Type::STRING, Some(&b"a string long enough to leave inline form"[..]));
    let b = src.new_value(&Type::INT64, Some(&coding::encode_int(-7)[..]));
    let rec = src.new_from_values(&pair, &[a, b]).unwrap();
    let want = src.value(&rec);
    assert_eq!(
        want.to_string(),
        r#"{a:"a string long enough to leave inline form",b:-7}"#
    );

    let mut dst = Arena::new();
    let copied = src.clone_to(&rec, &mut dst);
    drop(src);
    assert_eq!(dst.value(&copied).bytes(), want.bytes());
}

#[test]
fn test_batches_preserve_order() {
    let values: Vec<Value> = (0..25).map(Value::int64).collect();
    let mut puller = ReaderPuller::with_batch_size(IterReader(values.clone().into_iter()), 10);
    let mut sizes = Vec::new();
    let mut seen = Vec::new();
    while let Some(batch) = puller.pull(false).unwrap() {
        sizes.push(batch.len());
        seen.extend(batch.into_values());
    }
    assert_eq!(sizes, [10, 10, 5]);
    assert_eq!(seen, values);

    let mut sink: Vec<Value> = Vec::new();
    let n = copy(&mut sink, &mut IterReader(values.clone().into_iter())).unwrap();
    assert_eq!(n, 25);
    assert_eq!(sink, values);
}

#[test]
fn test_shared_context_across_threads() {
    let ctx = Arc::new(Context::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = ctx.clone();
            std::thread::spawn(move || nested_type(&ctx).id())
        })
        .collect();
    let ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_null_and_empty_are_distinct() {
    let ctx = Context::new();
    let arr = ctx.lookup_type_array(Type::INT64);
    let null = Value::null(arr.clone());
    let empty = Value::new(arr, Some(Builder::new().take().into()));
    assert_ne!(null, empty);
    assert_eq!(null.to_string(), "null");
    assert_eq!(empty.to_string(), "[]");
    assert!(Iter::new(empty.bytes().unwrap()).done());
}
