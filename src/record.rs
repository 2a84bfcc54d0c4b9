use serde_json::{Map, Value};

/// One resolved address: a mapping from field name to value.
///
/// Every record carries a `query` key holding the address it describes.
/// Other keys are service specific and may be nested (lists, objects)
/// until [`crate::normalize::flatten_for_table`] is applied.
pub type ResolutionRecord = Map<String, Value>;

/// Status value marking a record the service could not resolve.
pub const STATUS_FAILED: &str = "failed";

/// A record for an address that could not be resolved.
pub fn failed_record(query: &str, message: impl Into<String>) -> ResolutionRecord {
    let mut record = ResolutionRecord::new();
    record.insert("query".to_string(), Value::from(query));
    record.insert("status".to_string(), Value::from(STATUS_FAILED));
    record.insert("message".to_string(), Value::from(message.into()));
    record
}

/// The `query` value of a record, when it is a string.
#[inline]
pub fn query_of(record: &ResolutionRecord) -> Option<&str> {
    record.get("query").and_then(Value::as_str)
}

/// Whether the record is a failed-status record.
#[inline]
pub fn is_failed(record: &ResolutionRecord) -> bool {
    record.get("status").and_then(Value::as_str) == Some(STATUS_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_shape() {
        let rec = failed_record("8.8.8.8", "boom");
        assert_eq!(query_of(&rec), Some("8.8.8.8"));
        assert!(is_failed(&rec));
        assert_eq!(rec["message"], "boom");
    }
}
