//! Canonical JSON encoding.
//!
//! `serde_json`'s map ordering is an implementation detail, not a wire
//! contract — a browser wallet and this node must agree on the exact bytes
//! that get hashed regardless of which JSON library either side uses. This
//! module writes JSON with objects' keys sorted lexicographically (matching
//! `[amount, data, from, timestamp, to]`, which is already alphabetical) so
//! the same logical document always serializes to the same bytes.

use serde_json::Value;
use std::fmt::Write as _;

/// Serializes `value` with every object's keys sorted, producing
/// deterministic bytes suitable for hashing.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out.into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => {
            write_json_string(s, out);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        assert_eq!(canonical_bytes(&value), b"{\"a\":2,\"b\":1}");
    }

    #[test]
    fn sorts_nested_objects() {
        let value = json!({"outer": {"z": 1, "a": {"y": 2, "x": 3}}});
        assert_eq!(
            canonical_bytes(&value),
            b"{\"outer\":{\"a\":{\"x\":3,\"y\":2},\"z\":1}}"
        );
    }
}
