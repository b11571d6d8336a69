//! Stratum wire messages: newline-delimited JSON-RPC 1.0.
//!
//! Method names are part of the wire contract; see the dispatcher in
//! `server.rs` for the full set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON parse failure (connection stays open).
pub const ERR_PARSE: i64 = -32700;
/// Unknown method.
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;
/// Structurally valid request with bad params.
pub const ERR_INVALID_PARAMS: i64 = -32602;

/// An incoming request (or client notification when `id` is null).
#[derive(Clone, Debug, Deserialize)]
pub struct StratumRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// An outgoing response.
#[derive(Clone, Debug, Serialize)]
pub struct StratumResponse {
    pub id: Value,
    pub result: Value,
    pub error: Value,
}

impl StratumResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result,
            error: Value::Null,
        }
    }

    pub fn err(id: Value, code: i64, message: &str) -> Self {
        Self {
            id,
            result: Value::Null,
            error: serde_json::json!([code, message, Value::Null]),
        }
    }

    pub fn to_line(&self) -> String {
        // Serialization of this shape cannot fail.
        let mut line = serde_json::to_string(self).expect("response serializes");
        line.push('\n');
        line
    }
}

/// A server→client notification (`mining.notify`, `mining.set_difficulty`).
#[derive(Clone, Debug, Serialize)]
pub struct StratumNotification {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl StratumNotification {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            id: Value::Null,
            method: method.to_string(),
            params,
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).expect("notification serializes");
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_and_without_id() {
        let with_id: StratumRequest =
            serde_json::from_str(r#"{"id":1,"method":"mining.subscribe","params":[]}"#).unwrap();
        assert_eq!(with_id.method, "mining.subscribe");
        assert_eq!(with_id.id, serde_json::json!(1));

        let notification: StratumRequest =
            serde_json::from_str(r#"{"method":"mining.report_thermal","params":{}}"#).unwrap();
        assert!(notification.id.is_null());
    }

    #[test]
    fn response_lines_are_newline_terminated() {
        let line = StratumResponse::ok(serde_json::json!(3), serde_json::json!(true)).to_line();
        assert!(line.ends_with('\n'));
        assert!(!line[..line.len() - 1].contains('\n'));
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let response = StratumResponse::err(Value::Null, ERR_PARSE, "parse error");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"][0], serde_json::json!(ERR_PARSE));
        assert_eq!(json["result"], Value::Null);
    }
}
