use serde_json::Value;
use std::fmt::Write;

/// Compact JSON with object keys sorted at every depth.
///
/// Output depends only on the value, never on the order in which object
/// keys were inserted, so the same record always renders to the same bytes.
///
/// `serde_json::Map` is a `BTreeMap` only while serde_json's
/// `preserve_order` feature is off. Any crate in the build graph can turn
/// that feature on, and `serde_json::to_string` would then follow insertion
/// order, so keys are sorted here explicitly.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_str(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        // Quoting a str cannot fail; keep a printable fallback anyway.
        Err(_) => {
            let _ = write!(out, "\"{}\"", s.escape_default());
        }
    }
}
