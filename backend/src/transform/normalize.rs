//! Record normalization: materialize path-shaped column names.
//!
//! - `a.b.c = v` becomes `{a: {b: {c: v}}}`
//! - `list#k.attr = v` sets `attr` on element `k` of `list`
//! - `list#k = v` sets element `k` itself
//!
//! Keys sharing a prefix merge into the same structure, and gaps in a list
//! are padded with empty objects. The result only depends on the set of
//! `(path, value)` pairs, never on their order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Largest list index a column name may address
pub const MAX_LIST_INDEX: usize = 1_000;

/// `name` or `name#index`
static SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^([^#.]+)(?:#(\d+))?$").ok());

/// One path segment: a key, optionally indexing into a list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    index: Option<usize>,
}

/// Split a column name into segments, `None` if it is not a path.
fn parse_path(key: &str) -> Option<Vec<Segment>> {
    if !key.contains('.') && !key.contains('#') {
        return None;
    }
    let pattern = SEGMENT.as_ref()?;

    key.split('.')
        .map(|part| {
            let caps = pattern.captures(part)?;
            let index = match caps.get(2) {
                Some(digits) => Some(digits.as_str().parse().ok().filter(|k| *k <= MAX_LIST_INDEX)?),
                None => None,
            };
            Some(Segment {
                name: caps[1].to_string(),
                index,
            })
        })
        .collect()
}

/// Materialize every path-shaped key of a record.
///
/// Keys that look like paths but do not parse (`a..b`, `x#y`, or an index
/// above [`MAX_LIST_INDEX`]) are kept as is.
pub fn normalize_record(values: Map<String, Value>) -> Map<String, Value> {
    let mut plain = Map::new();
    let mut paths = Vec::new();

    for (key, value) in values {
        match parse_path(&key) {
            Some(segments) => paths.push((segments, value)),
            None => {
                plain.insert(key, value);
            }
        }
    }

    for (segments, value) in paths {
        set_path(&mut plain, &segments, value);
    }
    plain
}

fn set_path(map: &mut Map<String, Value>, segments: &[Segment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match head.index {
        None if rest.is_empty() => {
            map.insert(head.name.clone(), value);
        }
        None => {
            let child = map
                .entry(head.name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
        Some(k) => {
            let list = map
                .entry(head.name.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !list.is_array() {
                *list = Value::Array(Vec::new());
            }
            let Value::Array(items) = list else {
                return;
            };
            while items.len() <= k {
                items.push(Value::Object(Map::new()));
            }

            if rest.is_empty() {
                items[k] = value;
                return;
            }
            if !items[k].is_object() {
                items[k] = Value::Object(Map::new());
            }
            if let Value::Object(element) = &mut items[k] {
                set_path(element, rest, value);
            }
        }
    }
}
