//! Canonical forms for set and map bodies.
//!
//! Equal sets (and equal maps) have byte-equal bodies: elements are sorted by
//! `memcmp` of their bodies, nulls first, and duplicates removed.

use super::{read_element, Iter};
use crate::error::{Error, Result};

/// Split the next element off `it`, returning its body (the sort key) and
/// the whole tagged element.
fn next_keyed<'a>(it: &mut Iter<'a>) -> Result<(Option<&'a [u8]>, &'a [u8])> {
    let elem = it.next_tag_and_body()?;
    let (body, _) = read_element(elem)?;
    Ok((body, elem))
}

/// Sort a set body's elements and drop duplicates.
pub fn normalize_set(body: &[u8]) -> Result<Vec<u8>> {
    let mut elems = Vec::new();
    let mut it = Iter::new(body);
    while !it.done() {
        elems.push(next_keyed(&mut it)?);
    }
    elems.sort_by(|a, b| a.0.cmp(&b.0));
    elems.dedup_by(|a, b| a.0 == b.0);
    let mut out = Vec::with_capacity(body.len());
    for (_, elem) in elems {
        out.extend_from_slice(elem);
    }
    Ok(out)
}

/// Sort a map body's entries by key, keeping the last value for each key.
///
/// Each `(key, value)` pair moves as a unit. Entries with equal keys keep the
/// value that appeared last in input order.
pub fn normalize_map(body: &[u8]) -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    let mut it = Iter::new(body);
    while !it.done() {
        let key = next_keyed(&mut it)?;
        if it.done() {
            return Err(Error::BadValue("map body has a key without a value".into()));
        }
        let value = it.next_tag_and_body()?;
        entries.push((key, value));
    }
    // Stable, so equal keys stay in input order and the last one wins below.
    entries.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
    let mut out = Vec::with_capacity(body.len());
    for (i, ((key, elem), value)) in entries.iter().enumerate() {
        if entries.get(i + 1).map_or(false, |next| next.0 .0 == *key) {
            continue;
        }
        out.extend_from_slice(elem);
        out.extend_from_slice(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zcode::append;
    use proptest::prelude::*;

    fn strings(elems: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for e in elems {
            append(&mut out, Some(e.as_bytes()));
        }
        out
    }

    fn decode(body: &[u8]) -> Vec<String> {
        let mut it = Iter::new(body);
        let mut out = Vec::new();
        while !it.done() {
            out.push(String::from_utf8(it.next().unwrap().to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn test_set_sorted_and_deduped() {
        let body = normalize_set(&strings(&["z", "a", "dup", "dup"])).unwrap();
        assert_eq!(decode(&body), vec!["a", "dup", "z"]);
    }

    #[test]
    fn test_set_dedup_equals_single() {
        let dup = normalize_set(&strings(&["dup", "dup"])).unwrap();
        let single = normalize_set(&strings(&["dup"])).unwrap();
        assert_eq!(dup, single);
    }

    #[test]
    fn test_set_with_null() {
        let mut body = strings(&["b"]);
        append(&mut body, None);
        append(&mut body, None);
        let norm = normalize_set(&body).unwrap();
        let mut it = Iter::new(&norm);
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), Some(&b"b"[..]));
        assert!(it.done());
    }

    #[test]
    fn test_map_last_value_wins() {
        let body = strings(&["k", "1", "a", "x", "k", "2"]);
        let norm = normalize_map(&body).unwrap();
        assert_eq!(decode(&norm), vec!["a", "x", "k", "2"]);
    }

    #[test]
    fn test_map_odd_body_is_error() {
        let body = strings(&["k", "v", "dangling"]);
        assert!(matches!(normalize_map(&body), Err(Error::BadValue(_))));
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(normalize_set(&[0x80]).is_err());
    }

    proptest! {
        #[test]
        fn prop_set_normalize_idempotent(elems in proptest::collection::vec(
            proptest::option::of(proptest::collection::vec(any::<u8>(), 0..8)), 0..30)) {
            let mut body = Vec::new();
            for e in &elems {
                append(&mut body, e.as_deref());
            }
            let once = normalize_set(&body).unwrap();
            let twice = normalize_set(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_map_normalize_idempotent(entries in proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..4), proptest::collection::vec(any::<u8>(), 0..4)), 0..20)) {
            let mut body = Vec::new();
            for (k, v) in &entries {
                append(&mut body, Some(&k[..]));
                append(&mut body, Some(&v[..]));
            }
            let once = normalize_map(&body).unwrap();
            let twice = normalize_map(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
