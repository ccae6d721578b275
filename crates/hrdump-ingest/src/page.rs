//! Decoded response bodies

use crate::error::{IngestError, Result};
use serde_json::{Map, Value};

/// One decoded response body, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// Bare JSON array: the complete, unpaginated result
    Sequence(Vec<Value>),
    /// JSON object, expected to hold the collection under some key
    Mapping(Map<String, Value>),
    /// Anything else (string, number, bool, null)
    Scalar(Value),
}

impl PageResult {
    /// Decode a response body received from `url`.
    pub fn decode(url: &str, body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| IngestError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from(value))
    }

    pub fn into_value(self) -> Value {
        match self {
            PageResult::Sequence(items) => Value::Array(items),
            PageResult::Mapping(map) => Value::Object(map),
            PageResult::Scalar(value) => value,
        }
    }
}

impl From<Value> for PageResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => PageResult::Sequence(items),
            Value::Object(map) => PageResult::Mapping(map),
            other => PageResult::Scalar(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_shapes() {
        assert_eq!(
            PageResult::decode("u", br#"[{"id": 1}]"#).unwrap(),
            PageResult::Sequence(vec![json!({"id": 1})])
        );
        assert!(matches!(
            PageResult::decode("u", br#"{"candidates": []}"#).unwrap(),
            PageResult::Mapping(_)
        ));
        assert_eq!(
            PageResult::decode("u", b"\"1.1.0\"").unwrap(),
            PageResult::Scalar(json!("1.1.0"))
        );
    }

    #[test]
    fn test_decode_error_names_url() {
        let err = PageResult::decode("http://api/candidates", b"<html>").unwrap_err();
        match err {
            IngestError::Decode { url, .. } => assert_eq!(url, "http://api/candidates"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_into_value_round_trips() {
        let value = json!({"next": null, "results": [1, 2]});
        assert_eq!(PageResult::from(value.clone()).into_value(), value);
    }
}
