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

//! Deribit WebSocket client error types.

use thiserror::Error;

use crate::common::{consts::AUTHENTICATE_FAILED, rpc::DeribitJsonRpcError};

/// Error types for the Deribit user WebSocket client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeribitWsError {
    /// Client is not connected.
    #[error("Not connected")]
    NotConnected,
    /// The session was closed locally.
    #[error("Connection closed")]
    Closed,
    /// Dialing the endpoint failed or timed out.
    #[error("Connect error: {0}")]
    Connect(String),
    /// Reading a frame failed, including remote close and oversized frames.
    #[error("Read error: {0}")]
    Read(String),
    /// Failed to send message over WebSocket.
    #[error("Send error: {0}")]
    Send(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// The handshake could not be completed.
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// The handshake response carried no access token.
    #[error("{}", AUTHENTICATE_FAILED)]
    AuthenticationFailed,
    /// The server rejected the handshake.
    #[error("Authentication rejected {code}: {message}")]
    AuthenticationRejected {
        /// The error code from Deribit.
        code: i64,
        /// The error message from Deribit.
        message: String,
    },
    /// Error returned by Deribit API (JSON-RPC error response).
    #[error("Deribit error {code}: {message}")]
    DeribitError {
        /// The error code from Deribit.
        code: i64,
        /// The error message from Deribit.
        message: String,
    },
    /// Generic client error.
    #[error("Client error: {0}")]
    ClientError(String),
    /// Request timeout.
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for DeribitWsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<DeribitJsonRpcError> for DeribitWsError {
    fn from(error: DeribitJsonRpcError) -> Self {
        Self::DeribitError {
            code: error.code,
            message: error.message,
        }
    }
}

/// Result type alias for Deribit WebSocket operations.
pub type DeribitWsResult<T> = Result<T, DeribitWsError>;

/// Determines if a terminated session should be re-established.
#[must_use]
pub fn should_reconnect_deribit_ws_error(error: &DeribitWsError) -> bool {
    match error {
        DeribitWsError::Connect(_)
        | DeribitWsError::Read(_)
        | DeribitWsError::Send(_)
        | DeribitWsError::NotConnected
        | DeribitWsError::Timeout(_) => true,
        DeribitWsError::DeribitError { code, .. } => {
            // Deribit retriable error codes
            matches!(
                code,
                10028 | 10040 | 10041 | 10047 | 10066 | 11051 | 11094 | 13028 | 13888
            )
        }
        DeribitWsError::Closed
        | DeribitWsError::Json(_)
        | DeribitWsError::Authentication(_)
        | DeribitWsError::AuthenticationFailed
        | DeribitWsError::AuthenticationRejected { .. }
        | DeribitWsError::ClientError(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_authentication_failed_message() {
        assert_eq!(
            DeribitWsError::AuthenticationFailed.to_string(),
            "Authenticate Failed"
        );
    }

    #[rstest]
    fn test_from_rpc_error() {
        let rpc_error = DeribitJsonRpcError {
            code: 11050,
            message: "bad_request".to_string(),
            data: None,
        };

        assert_eq!(
            DeribitWsError::from(rpc_error),
            DeribitWsError::DeribitError {
                code: 11050,
                message: "bad_request".to_string(),
            }
        );
    }

    #[rstest]
    #[case(DeribitWsError::Read("reset".to_string()), true)]
    #[case(DeribitWsError::Connect("refused".to_string()), true)]
    #[case(DeribitWsError::DeribitError { code: 10028, message: "too_many_requests".to_string() }, true)]
    #[case(DeribitWsError::DeribitError { code: 11050, message: "bad_request".to_string() }, false)]
    #[case(DeribitWsError::AuthenticationRejected { code: 13004, message: "invalid_credentials".to_string() }, false)]
    #[case(DeribitWsError::Json("eof".to_string()), false)]
    #[case(DeribitWsError::Closed, false)]
    fn test_should_reconnect(#[case] error: DeribitWsError, #[case] expected: bool) {
        assert_eq!(should_reconnect_deribit_ws_error(&error), expected);
    }
}
