// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines framing of the method channel.
//
// One request per line on stdin, one response per line on stdout:
//
//   {"id": 7, "method": "printTcp", "arguments": {"ip": "10.0.0.5", ...}}
//   {"id": 7, "outcome": {"success": true}}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bonprint_core::error::Result;
use bonprint_core::outcome::{CommandError, ErrorKind, Outcome};
use bonprint_core::types::Arguments;

/// Host-side lifecycle calls, handled by the host rather than the bridge.
pub const ATTACH_METHOD: &str = "attachHost";
pub const DETACH_METHOD: &str = "detachHost";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// `None` only when the request line was too broken to carry an id.
    pub id: Option<u64>,
    pub outcome: Outcome,
}

impl Response {
    pub fn new(id: u64, outcome: Outcome) -> Self {
        Self {
            id: Some(id),
            outcome,
        }
    }
}

/// Parse one request line. A line that is not a valid request yields the
/// error response to send back instead, keeping its id when one is readable.
pub fn parse_request(line: &str) -> std::result::Result<Request, Response> {
    serde_json::from_str(line).map_err(|e| {
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_u64));
        Response {
            id,
            outcome: Outcome::Error(CommandError::new(
                ErrorKind::InvalidArguments,
                format!("Malformed request: {e}"),
            )),
        }
    })
}

/// Serialise a response as one line, newline included.
pub fn encode_response(response: &Response) -> Result<String> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_arguments_default_to_empty() {
        let req = parse_request(r#"{"id": 1, "method": "getPlatformVersion"}"#).expect("parse");
        assert_eq!(req.id, 1);
        assert_eq!(req.method, "getPlatformVersion");
        assert_eq!(req.arguments, Arguments::new());
    }

    #[test]
    fn request_arguments_are_kept_verbatim() {
        let req = parse_request(
            r#"{"id": 2, "method": "printTcp", "arguments": {"ip": "10.0.0.5", "port": 9100, "payload": "[C]Hi"}}"#,
        )
        .expect("parse");
        assert_eq!(req.arguments.str("ip"), Some("10.0.0.5"));
        assert_eq!(req.arguments.int("port"), Some(9100));
    }

    #[test]
    fn malformed_request_keeps_readable_id() {
        let resp = parse_request(r#"{"id": 9, "method": 42}"#).expect_err("rejected");
        assert_eq!(resp.id, Some(9));
        assert_eq!(resp.outcome.error_kind(), Some(ErrorKind::InvalidArguments));

        let resp = parse_request("not json").expect_err("rejected");
        assert_eq!(resp.id, None);
    }

    #[test]
    fn outcomes_encode_as_tagged_objects() {
        let line = encode_response(&Response::new(3, Outcome::Success(json!(true)))).expect("encode");
        assert_eq!(line, "{\"id\":3,\"outcome\":{\"success\":true}}\n");

        let line = encode_response(&Response::new(4, Outcome::NotImplemented)).expect("encode");
        assert_eq!(line, "{\"id\":4,\"outcome\":\"notImplemented\"}\n");
    }

    #[test]
    fn errors_carry_code_message_and_details() {
        let err = CommandError::new(ErrorKind::PermissionDenied, "Bluetooth permission is required for printing");
        let line = encode_response(&Response::new(5, Outcome::Error(err))).expect("encode");
        let value: Value = serde_json::from_str(&line).expect("json");
        assert_eq!(
            value,
            json!({
                "id": 5,
                "outcome": {"error": {
                    "code": "PERMISSION_DENIED",
                    "message": "Bluetooth permission is required for printing",
                }},
            })
        );
    }
}
