//! Response normalization and error classification.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::ops::Index;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::options::Header;

/// Unprocessed outcome of one session execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResult {
    /// `0` when no response was received.
    pub status_code: u16,
    pub elapsed: Duration,
    pub status_line: String,
    /// Buffered body. Empty for successful downloads and callback-streamed requests.
    pub content: Bytes,
    /// Effective URL after redirects.
    pub url: String,
    pub reason: String,
    pub headers: Header,
}

/// A classified response with its JSON body parsed when there is one.
///
/// # Example
/// ```rust
/// use oaiclient::response::{RawResult, Response};
///
/// let raw = RawResult {
///     status_code: 200,
///     content: r#"{"id":"abc"}"#.into(),
///     reason: "OK".to_string(),
///     ..Default::default()
/// };
/// let response = Response::new(raw).unwrap();
/// assert_eq!(response["id"], "abc");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    raw: RawResult,
    json: Value,
}

impl Response {
    /// Parse and classify `raw`. Non-2xx results become errors.
    ///
    /// Only a 2xx body that opens an object but fails to parse is a
    /// [`ClientError::Parse`]. A status of `0` is always a connection error,
    /// and other failures fall back to classifying without a body.
    pub fn new(raw: RawResult) -> Result<Self> {
        let json = match raw.status_code {
            0 => Value::Null,
            200..=299 => parse_content(&raw.content)?,
            _ => parse_content(&raw.content).unwrap_or(Value::Null),
        };
        classify(&raw, &json)?;
        Ok(Self { raw, json })
    }

    pub fn status_code(&self) -> u16 {
        self.raw.status_code
    }

    pub fn elapsed(&self) -> Duration {
        self.raw.elapsed
    }

    pub fn status_line(&self) -> &str {
        &self.raw.status_line
    }

    pub fn content(&self) -> &Bytes {
        &self.raw.content
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw.content)
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn reason(&self) -> &str {
        &self.raw.reason
    }

    pub fn headers(&self) -> &Header {
        &self.raw.headers
    }

    /// Parsed body, `Value::Null` when the content is not a JSON object.
    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.json.get(key)
    }

    /// Deserialize the body into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.raw.content)?)
    }

    pub fn into_raw(self) -> RawResult {
        self.raw
    }
}

impl Index<&str> for Response {
    type Output = Value;

    /// Missing keys index to `Value::Null`.
    fn index(&self, key: &str) -> &Value {
        &self.json[key]
    }
}

/// Parse `content` only when it opens a JSON object.
///
/// Anything else (empty, plain text, binary) yields `Value::Null`. Content
/// that starts with `{` but is not valid JSON is a parse error.
pub fn parse_content(content: &[u8]) -> Result<Value> {
    match content.first() {
        Some(b'{') => Ok(serde_json::from_slice(content)?),
        _ => Ok(Value::Null),
    }
}

/// Decide whether a raw result is a success.
///
/// Pure function of its inputs: classifying the same result twice gives the
/// same answer.
pub fn classify(raw: &RawResult, json: &Value) -> Result<()> {
    if raw.status_code == 0 {
        let message = if raw.reason.is_empty() {
            "no response received".to_string()
        } else {
            raw.reason.clone()
        };
        return Err(ClientError::Connection(message));
    }

    if (200..300).contains(&raw.status_code) {
        return Ok(());
    }

    let error = json.get("error");
    let message = error.and_then(|error| match error {
        Value::String(message) => Some(message.as_str()),
        other => other.get("message").and_then(Value::as_str),
    });

    if raw.status_code == 429 {
        return Err(ClientError::RateLimited(
            message.unwrap_or(&raw.reason).to_string(),
        ));
    }

    match message {
        Some(message) => Err(ClientError::Api {
            status: raw.status_code,
            message: message.to_string(),
            error_type: error
                .and_then(|error| error.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string),
            code: error.and_then(|error| error.get("code")).and_then(|code| match code {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            }),
        }),
        None => Err(ClientError::BadRequest {
            status: raw.status_code,
            message: raw.reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    fn raw(status_code: u16, reason: &str, content: &'static str) -> RawResult {
        RawResult {
            status_code,
            status_line: format!("HTTP/1.1 {status_code} {reason}"),
            reason: reason.to_string(),
            content: Bytes::from_static(content.as_bytes()),
            url: "https://api.openai.com/v1/models".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_json_keys_round_trip() {
        let response = Response::new(raw(
            200,
            "OK",
            r#"{"id":"abc","object":"list","data":[1,2],"nested":{"a":null}}"#,
        ))
        .unwrap();

        let mut keys: Vec<&str> = response
            .json()
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["data", "id", "nested", "object"]);
        assert_eq!(response["id"], "abc");
        assert_eq!(response["missing"], Value::Null);
    }

    #[test]
    fn test_non_json_bodies_never_error() {
        let bodies: [&'static str; 4] = ["", "plain text", "[1,2,3]", "ID3\u{0}\u{1}binary"];
        for body in bodies {
            let response = Response::new(raw(200, "OK", body)).unwrap();
            assert_eq!(response.json(), &Value::Null);
        }
        // Non-object content is never parsed, whatever the status.
        assert_eq!(parse_content(b"<html>bad gateway</html>").unwrap(), Value::Null);
    }

    #[test]
    fn test_binary_content_is_kept() {
        let mut result = raw(200, "OK", "");
        result.content = Bytes::from_static(&[0xff, 0xd8, 0xff, 0x00]);
        let response = Response::new(result).unwrap();
        assert_eq!(response.content().as_ref(), &[0xff, 0xd8, 0xff, 0x00]);
        assert_eq!(response.json(), &Value::Null);
    }

    #[test]
    fn test_malformed_object_is_parse_error() {
        let result = Response::new(raw(200, "OK", r#"{"id": "abc""#));
        assert!(matches!(result, Err(ClientError::Parse(_))));
    }

    #[test]
    fn test_2xx_is_success_even_without_json() {
        for status in [200, 201, 204, 299] {
            assert!(Response::new(raw(status, "OK", "")).is_ok());
        }
    }

    #[test]
    fn test_429_uses_reason_without_error_body() {
        let err = Response::new(raw(429, "Too Many Requests", "")).unwrap_err();
        assert!(matches!(&err, ClientError::RateLimited(message) if message == "Too Many Requests"));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_429_prefers_error_message() {
        let err = Response::new(raw(
            429,
            "Too Many Requests",
            r#"{"error":{"message":"Rate limit reached for gpt-4o"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ClientError::RateLimited(message) if message == "Rate limit reached for gpt-4o"));
    }

    #[test]
    fn test_status_zero_is_connection_error() {
        let err = Response::new(raw(0, "", r#"{"id":"abc"}"#)).unwrap_err();
        assert!(matches!(err, ClientError::Connection(message) if message == "no response received"));

        let err = Response::new(raw(0, "connection refused", "anything")).unwrap_err();
        assert!(matches!(err, ClientError::Connection(message) if message == "connection refused"));
    }

    #[test]
    fn test_status_zero_with_truncated_object_is_connection_error() {
        let err = Response::new(raw(0, "", r#"{"id":"#)).unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }

    #[test]
    fn test_truncated_error_body_keeps_status_kind() {
        let err = Response::new(raw(429, "Too Many Requests", r#"{"error":"#)).unwrap_err();
        assert!(matches!(&err, ClientError::RateLimited(message) if message == "Too Many Requests"));
        assert!(err.is_rate_limited());

        let err = Response::new(raw(502, "Bad Gateway", r#"{"error": {"mess"#)).unwrap_err();
        assert!(matches!(err, ClientError::BadRequest { status: 502, .. }));
    }

    #[test]
    fn test_404_with_error_body_is_api_error() {
        let err = Response::new(raw(
            404,
            "Not Found",
            r#"{"error":{"message":"not found","type":"invalid_request_error","code":"model_not_found"}}"#,
        ))
        .unwrap_err();

        match err {
            ClientError::Api {
                status,
                message,
                error_type,
                code,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "not found");
                assert_eq!(error_type.as_deref(), Some("invalid_request_error"));
                assert_eq!(code.as_deref(), Some("model_not_found"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_2xx_without_error_body_is_bad_request() {
        let err = Response::new(raw(500, "Internal Server Error", "upstream died")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::BadRequest { status: 500, message } if message == "Internal Server Error"
        ));

        let err = Response::new(raw(400, "Bad Request", r#"{"detail":"nope"}"#)).unwrap_err();
        assert!(matches!(err, ClientError::BadRequest { status: 400, .. }));
    }

    #[test]
    fn test_string_error_body_is_api_error() {
        let err = Response::new(raw(401, "Unauthorized", r#"{"error":"invalid key"}"#)).unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 401, message, .. } if message == "invalid key"));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let cases = [
            raw(200, "OK", r#"{"id":"abc"}"#),
            raw(404, "Not Found", r#"{"error":{"message":"not found"}}"#),
            raw(429, "Too Many Requests", ""),
            raw(0, "", ""),
            raw(503, "Service Unavailable", ""),
        ];
        for case in cases {
            let json = parse_content(&case.content).unwrap();
            let first = classify(&case, &json).map_err(|e| e.to_string());
            let second = classify(&case, &json).map_err(|e| e.to_string());
            assert_eq!(first, second);
        }
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            ".{0,16}".prop_map(Value::from),
        ]
    }

    fn with_status(status_code: u16, content: Vec<u8>) -> RawResult {
        RawResult {
            status_code,
            content: content.into(),
            ..Default::default()
        }
    }

    proptest! {
        #[test]
        fn prop_object_keys_survive_parsing(
            fields in proptest::collection::btree_map("[a-zA-Z_][a-zA-Z0-9_]{0,11}", json_leaf(), 0..12),
            status_code in 200u16..300,
        ) {
            let object: serde_json::Map<String, Value> = fields.clone().into_iter().collect();
            let content = serde_json::to_vec(&Value::Object(object)).unwrap();

            let response = Response::new(with_status(status_code, content)).unwrap();
            let parsed = response.json().as_object().unwrap();
            prop_assert_eq!(parsed.len(), fields.len());
            for (key, value) in &fields {
                prop_assert_eq!(parsed.get(key), Some(value));
            }
        }

        #[test]
        fn prop_non_object_content_is_never_parsed(
            content in proptest::collection::vec(any::<u8>(), 0..64)
                .prop_filter("must not open an object", |bytes| bytes.first() != Some(&b'{')),
            status_code in any::<u16>(),
        ) {
            prop_assert_eq!(parse_content(&content).unwrap(), Value::Null);

            match Response::new(with_status(status_code, content)) {
                Ok(response) => {
                    prop_assert!((200..300).contains(&status_code));
                    prop_assert_eq!(response.json(), &Value::Null);
                }
                Err(err) => {
                    prop_assert!(!matches!(err, ClientError::Parse(_) | ClientError::Api { .. }), "unexpected error variant: {:?}", err);
                    prop_assert!(!(200..300).contains(&status_code));
                }
            }
        }

        #[test]
        fn prop_status_zero_is_always_connection_error(
            content in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let err = Response::new(with_status(0, content)).unwrap_err();
            prop_assert!(matches!(err, ClientError::Connection(_)));
        }
    }

    #[test]
    fn test_typed_parse() {
        #[derive(Deserialize)]
        struct Model {
            id: String,
        }

        let response = Response::new(raw(200, "OK", r#"{"id":"gpt-4o"}"#)).unwrap();
        let model: Model = response.parse().unwrap();
        assert_eq!(model.id, "gpt-4o");
    }
}
