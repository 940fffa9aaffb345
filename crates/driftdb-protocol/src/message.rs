//! Request and response messages.
//!
//! A request is always a `"query"` message. A response is an error when its
//! `type` field is `"error"`; any other `type` (or none at all) is a result.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolError;
use crate::row_object::RowObject;
use crate::value::Value;

/// SQLSTATE class for invalid authorization specification.
const AUTHORIZATION_SQLSTATE_CLASS: &str = "28";

/// Message prefix that marks a credential rejection.
const AUTH_FAILED_PREFIX: &str = "authentication failed";

/// Message kind carried in the `type` field of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// A SQL statement with positional parameters.
    Query,
}

/// A single request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// SQL text, sent verbatim.
    pub query: String,
    /// Ordered parameter values.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    /// Build a query request.
    #[must_use]
    pub fn query(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            kind: RequestKind::Query,
            query: sql.into(),
            params,
        }
    }

    /// Serialize the request as one JSON line, including the trailing newline.
    pub fn to_line(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Successful query payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Column names in server order.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Row objects keyed by column name, keys in wire order.
    #[serde(default)]
    pub rows: Vec<RowObject>,
    /// Server-side execution time, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
}

/// Error payload reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Human-readable message.
    pub message: String,
    /// Optional SQLSTATE-style code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServerError {
    /// Create an error payload without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a SQLSTATE-style code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the server rejected the caller's credentials.
    ///
    /// True when the code is in SQLSTATE class `28` or the message starts
    /// with "authentication failed", whatever the code.
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        let class_28 = self
            .code
            .as_deref()
            .is_some_and(|code| code.starts_with(AUTHORIZATION_SQLSTATE_CLASS));
        class_28
            || self
                .message
                .get(..AUTH_FAILED_PREFIX.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(AUTH_FAILED_PREFIX))
    }
}

/// A single response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    /// Query succeeded.
    Result(QueryResponse),
    /// Query failed on the server.
    Error(ServerError),
}

impl Response {
    /// Decode one response line (without its trailing newline).
    pub fn from_line(line: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(line)?)
    }

    /// Serialize the response as one JSON line, including the trailing newline.
    pub fn to_line(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Wire shape before the `type` field is interpreted.
#[derive(Deserialize)]
struct RawResponse {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<RowObject>,
    #[serde(default)]
    execution_time_ms: Option<f64>,
}

impl From<RawResponse> for Response {
    fn from(raw: RawResponse) -> Self {
        if raw.kind.as_deref() == Some("error") {
            return Self::Error(ServerError {
                message: raw.message.unwrap_or_else(|| "Unknown error".to_string()),
                code: raw.code,
            });
        }
        Self::Result(QueryResponse {
            columns: raw.columns,
            rows: raw.rows,
            execution_time_ms: raw.execution_time_ms,
        })
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawResponse::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line_shape() {
        let line = Request::query("SELECT ?", vec![Value::Int(1)])
            .to_line()
            .unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let json: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(json["type"], "query");
        assert_eq!(json["query"], "SELECT ?");
        assert_eq!(json["params"], serde_json::json!([1]));
    }

    #[test]
    fn test_decode_result() {
        let line = br#"{"type":"result","columns":["id","name"],"rows":[{"name":"a","id":1}],"execution_time_ms":1.5}"#;
        match Response::from_line(line).unwrap() {
            Response::Result(r) => {
                assert_eq!(r.columns, vec!["id", "name"]);
                assert_eq!(r.rows.len(), 1);
                assert_eq!(r.rows[0]["id"], Value::Int(1));
                assert_eq!(r.execution_time_ms, Some(1.5));
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_untyped_result_defaults() {
        match Response::from_line(b"{}").unwrap() {
            Response::Result(r) => {
                assert!(r.columns.is_empty());
                assert!(r.rows.is_empty());
                assert_eq!(r.execution_time_ms, None);
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_default_message() {
        match Response::from_line(br#"{"type":"error"}"#).unwrap() {
            Response::Error(e) => assert_eq!(e.message, "Unknown error"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            Response::from_line(b"not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(Response::from_line(br#"{"rows":[1,2]}"#).is_err());
    }

    #[test]
    fn test_authentication_detection() {
        assert!(ServerError::new("denied").with_code("28P01").is_authentication_failure());
        assert!(!ServerError::new("denied").with_code("42601").is_authentication_failure());
        assert!(ServerError::new("Authentication failed for user").is_authentication_failure());
        assert!(!ServerError::new("syntax error").is_authentication_failure());
    }

    #[test]
    fn test_authentication_message_wins_over_unrelated_code() {
        let error = ServerError::new("authentication failed for user \"bob\"").with_code("XX000");
        assert!(error.is_authentication_failure());
        assert!(!ServerError::new("auth").with_code("XX000").is_authentication_failure());
    }

    #[test]
    fn test_row_keys_keep_wire_order() {
        let line = br#"{"columns":["id"],"rows":[{"id":1,"zeta":true,"alpha":false}]}"#;
        match Response::from_line(line).unwrap() {
            Response::Result(r) => {
                let keys: Vec<&str> = r.rows[0].iter().map(|(k, _)| k).collect();
                assert_eq!(keys, ["id", "zeta", "alpha"]);
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_response_serializes_with_tag() {
        let line = Response::Error(ServerError::new("boom")).to_line().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "boom");
    }
}
