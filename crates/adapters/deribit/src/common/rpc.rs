// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! JSON-RPC 2.0 protocol structures for the Deribit WebSocket interface.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::consts::JSONRPC_VERSION;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeribitJsonRpcRequest<T> {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlation.
    pub id: u64,
    /// JSON-RPC method name.
    pub method: String,
    /// Method-specific parameters.
    pub params: T,
}

impl<T> DeribitJsonRpcRequest<T> {
    /// Creates a new JSON-RPC request.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC request identifier, either numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeribitRequestId {
    Num(u64),
    Str(String),
}

impl DeribitRequestId {
    /// Returns whether the ID identifies a real request.
    ///
    /// Server notifications travel as requests with a zero or empty ID, so only a
    /// non-zero number or a non-empty string counts as present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Num(num) => *num != 0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    /// Returns the numeric value, if any.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(num) => Some(*num),
            Self::Str(_) => None,
        }
    }
}

impl Display for DeribitRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(num) => write!(f, "{num}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeribitJsonRpcResponse<T> {
    /// JSON-RPC version.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request ID (present for request responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DeribitRequestId>,
    /// Success result (mutually exclusive with error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Error details (mutually exclusive with result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeribitJsonRpcError>,
    /// Whether this is from testnet.
    #[serde(default)]
    pub testnet: bool,
    /// Server receive timestamp (microseconds).
    #[serde(rename = "usIn")]
    pub us_in: Option<u64>,
    /// Server send timestamp (microseconds).
    #[serde(rename = "usOut")]
    pub us_out: Option<u64>,
    /// Processing time difference (microseconds).
    #[serde(rename = "usDiff")]
    pub us_diff: Option<u64>,
}

impl<T> DeribitJsonRpcResponse<T> {
    /// Returns the request ID when it identifies a real request.
    #[must_use]
    pub fn present_id(&self) -> Option<&DeribitRequestId> {
        self.id.as_ref().filter(|id| id.is_present())
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeribitJsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_request_serialization() {
        let request = DeribitJsonRpcRequest::new(
            7,
            "/private/subscribe",
            json!({"channels": ["user.orders.any.any.raw"]}),
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "/private/subscribe",
                "params": {"channels": ["user.orders.any.any.raw"]}
            })
        );
    }

    #[rstest]
    #[case(r#"{"id": 1}"#, true)]
    #[case(r#"{"id": 0}"#, false)]
    #[case(r#"{"id": "abc"}"#, true)]
    #[case(r#"{"id": ""}"#, false)]
    #[case(r#"{"id": null}"#, false)]
    #[case(r#"{}"#, false)]
    fn test_present_id(#[case] json: &str, #[case] expected: bool) {
        let response: DeribitJsonRpcResponse<serde_json::Value> =
            serde_json::from_str(json).unwrap();
        assert_eq!(response.present_id().is_some(), expected);
    }

    #[rstest]
    fn test_error_response_deserialization() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": 13004, "message": "invalid_credentials"},
            "testnet": true,
            "usIn": 1699999999000000,
            "usOut": 1699999999001000,
            "usDiff": 1000
        }"#;

        let response: DeribitJsonRpcResponse<serde_json::Value> =
            serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();

        assert_eq!(response.id, Some(DeribitRequestId::Num(3)));
        assert_eq!(error.code, 13004);
        assert_eq!(error.message, "invalid_credentials");
        assert!(response.result.is_none());
        assert_eq!(response.us_diff, Some(1000));
    }
}
