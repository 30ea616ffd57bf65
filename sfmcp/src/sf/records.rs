//! Untyped record helpers shared by the adapter and the tool reshaping layer.

use serde_json::{Map, Value};

/// One row of query output (or one describe entry): string keys, JSON values.
pub type Record = Map<String, Value>;

/// Read a string field, treating `null`/missing/non-string as absent.
pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Same as [`str_field`] but returns an owned value.
pub fn string_field(record: &Record, key: &str) -> Option<String> {
    str_field(record, key).map(str::to_string)
}

/// Read an integer field. The CLI sometimes renders numbers as floats.
pub fn int_field(record: &Record, key: &str) -> Option<i64> {
    let value = record.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

pub fn bool_field(record: &Record, key: &str) -> Option<bool> {
    record.get(key).and_then(Value::as_bool)
}

/// Lower-case the first character of a key: `LastRunDate` → `lastRunDate`.
pub fn camel_case_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalize a query row to camelCase keys, dropping the `attributes` entry
/// the CLI attaches to every record.
pub fn camel_case_record(record: Record) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| key != "attributes")
        .map(|(key, value)| (camel_case_key(&key), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_str_field() {
        let r = record(json!({"Name": "Acme", "Amount": 12, "Owner": null}));
        assert_eq!(str_field(&r, "Name"), Some("Acme"));
        assert_eq!(str_field(&r, "Amount"), None);
        assert_eq!(str_field(&r, "Owner"), None);
        assert_eq!(str_field(&r, "Missing"), None);
    }

    #[test]
    fn test_int_field_accepts_integral_floats() {
        let r = record(json!({"a": 3, "b": 4.0, "c": 4.5, "d": "5"}));
        assert_eq!(int_field(&r, "a"), Some(3));
        assert_eq!(int_field(&r, "b"), Some(4));
        assert_eq!(int_field(&r, "c"), None);
        assert_eq!(int_field(&r, "d"), None);
    }

    #[test]
    fn test_camel_case_key() {
        assert_eq!(camel_case_key("Id"), "id");
        assert_eq!(camel_case_key("LastRunDate"), "lastRunDate");
        assert_eq!(camel_case_key("title"), "title");
        assert_eq!(camel_case_key(""), "");
    }

    #[test]
    fn test_camel_case_record_drops_attributes() {
        let r = record(json!({
            "attributes": {"type": "Report", "url": "/services/data/v60.0/sobjects/Report/00O"},
            "Id": "00O1",
            "FolderName": "Sales",
        }));
        let normalized = camel_case_record(r);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized["id"], "00O1");
        assert_eq!(normalized["folderName"], "Sales");
        assert!(!normalized.contains_key("attributes"));
    }
}
