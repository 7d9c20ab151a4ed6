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

//! Authentication handshake and state for Deribit WebSocket connections.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    error::{DeribitWsError, DeribitWsResult},
    messages::{DeribitAuthParams, DeribitAuthResult, encode_request},
    transport::DeribitWsTransport,
};
use crate::common::{
    consts::{GRANT_TYPE_CLIENT_CREDENTIALS, METHOD_AUTH},
    credential::Credential,
    rpc::DeribitJsonRpcResponse,
};

/// Authentication state storing OAuth tokens.
#[derive(Clone)]
pub struct AuthState {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: String,
    /// Token expiration time in seconds from authentication.
    pub expires_in: u64,
    /// Timestamp when tokens were obtained (Unix milliseconds).
    pub obtained_at: u64,
    /// Granted scope.
    pub scope: String,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(AuthState))
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .field("scope", &self.scope)
            .finish()
    }
}

impl AuthState {
    /// Creates a new [`AuthState`] from an authentication result.
    #[must_use]
    pub fn from_auth_result(result: &DeribitAuthResult, obtained_at: u64) -> Self {
        Self {
            access_token: result.access_token.clone(),
            refresh_token: result.refresh_token.clone(),
            expires_in: result.expires_in,
            obtained_at,
            scope: result.scope.clone(),
        }
    }

    /// Returns the expiration timestamp in Unix milliseconds.
    #[must_use]
    pub fn expires_at_ms(&self) -> u64 {
        self.obtained_at
            .saturating_add(self.expires_in.saturating_mul(1000))
    }

    /// Returns whether the token is expired or near expiry (within 60 seconds).
    #[must_use]
    pub fn is_expired(&self, current_time_ms: u64) -> bool {
        current_time_ms.saturating_add(60_000) >= self.expires_at_ms()
    }
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Performs the `client_credentials` handshake over a freshly connected transport.
///
/// Sends a single `/public/auth` request and reads exactly one frame as its response.
/// No other traffic may be in flight while this runs.
///
/// # Errors
///
/// - [`DeribitWsError::Send`] if the request cannot be written.
/// - [`DeribitWsError::Authentication`] if the response cannot be read or decoded.
/// - [`DeribitWsError::AuthenticationRejected`] with the server's code and message when
///   the response carries an error object.
/// - [`DeribitWsError::AuthenticationFailed`] when the result has no access token.
pub async fn authenticate(
    transport: &DeribitWsTransport,
    credential: &Credential,
    request_id: u64,
) -> DeribitWsResult<AuthState> {
    tracing::debug!(
        "Authenticating with API key {}",
        credential.api_key_masked()
    );

    let params = DeribitAuthParams {
        grant_type: GRANT_TYPE_CLIENT_CREDENTIALS.to_string(),
        client_id: credential.api_key().to_string(),
        client_secret: credential.api_secret().to_string(),
    };
    let payload = encode_request(request_id, METHOD_AUTH, params)?;
    transport.write_text(payload).await?;

    let text = transport
        .read_text()
        .await
        .map_err(|e| DeribitWsError::Authentication(e.to_string()))?;

    let response: DeribitJsonRpcResponse<DeribitAuthResult> = serde_json::from_str(&text)
        .map_err(|e| DeribitWsError::Authentication(format!("Invalid auth response: {e}")))?;

    if let Some(error) = response.error {
        return Err(DeribitWsError::AuthenticationRejected {
            code: error.code,
            message: error.message,
        });
    }

    let result = response.result.unwrap_or_default();
    if result.access_token.is_empty() {
        return Err(DeribitWsError::AuthenticationFailed);
    }

    Ok(AuthState::from_auth_result(&result, unix_time_ms()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn auth_result() -> DeribitAuthResult {
        DeribitAuthResult {
            access_token: "access".to_string(),
            expires_in: 900,
            refresh_token: "refresh".to_string(),
            scope: "connection mainaccount".to_string(),
            token_type: "bearer".to_string(),
            enabled_features: Vec::new(),
        }
    }

    #[rstest]
    fn test_auth_state_expiry() {
        let state = AuthState::from_auth_result(&auth_result(), 1_000_000);

        assert_eq!(state.expires_at_ms(), 1_900_000);
        assert!(!state.is_expired(1_000_000));
        assert!(state.is_expired(1_840_000));
        assert!(state.is_expired(2_000_000));
    }

    #[rstest]
    fn test_auth_state_debug_redacts_tokens() {
        let state = AuthState::from_auth_result(&auth_result(), 0);
        let debug = format!("{state:?}");

        assert!(!debug.contains("access\""));
        assert!(!debug.contains("refresh\""));
        assert!(debug.contains("<redacted>"));
    }

    #[rstest]
    fn test_auth_result_without_token_decodes() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"token_type":"bearer"}}"#;
        let response: DeribitJsonRpcResponse<DeribitAuthResult> =
            serde_json::from_str(json).unwrap();

        assert!(response.result.unwrap().access_token.is_empty());
    }
}
