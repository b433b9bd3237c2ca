//! Terminal transitions. Both are one-way: once a record carries a real
//! cessation or deprecation date it is never rewritten.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use pcs_schemas::is_specified;

const EDTF_DATE: &str = "%Y-%m-%d";

/// Mark `doc` ceased as of `as_of`. `None` when it already is.
pub fn cease(doc: &Value, as_of: NaiveDate) -> Option<Value> {
    terminate(doc, "edtf:cessation", as_of)
}

/// Mark `doc` deprecated on `on`. `None` when it already is.
pub fn deprecate(doc: &Value, on: NaiveDate) -> Option<Value> {
    terminate(doc, "edtf:deprecated", on)
}

fn terminate(doc: &Value, key: &str, date: NaiveDate) -> Option<Value> {
    let current = doc
        .get("properties")
        .and_then(|p| p.get(key))
        .and_then(Value::as_str);
    if is_specified(current) {
        return None;
    }

    let mut out = doc.clone();
    let root = out.as_object_mut()?;
    let mut props = match root.remove("properties") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    props.insert(key.to_string(), Value::from(date.format(EDTF_DATE).to_string()));
    props.insert("mz:is_current".to_string(), Value::from(0));
    root.insert("properties".to_string(), Value::Object(props));
    Some(out)
}
