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

//! Configuration structures for the Deribit user WebSocket client.
//!
//! # Reconnection
//!
//! [`DeribitWsConfig::auto_reconnect`] is never consulted by the client itself. A dropped
//! session ends the consume loop with an error; only the
//! [`DeribitWsSupervisor`](crate::websocket::supervisor::DeribitWsSupervisor) reads the flag
//! and the [`ReconnectConfig`] backoff settings.

use std::{env, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::common::{
    consts::{CONNECT_TIMEOUT, DERIBIT_TESTNET_WS_URL, DERIBIT_WS_URL, MAX_MESSAGE_SIZE},
    credential::Credential,
};

/// Default initial backoff duration for reconnections.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Default maximum backoff duration for reconnections.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Default backoff multiplier for reconnections.
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for the Deribit user WebSocket client.
#[derive(Clone, Debug)]
pub struct DeribitWsConfig {
    /// The WebSocket endpoint to connect to.
    pub url: String,
    /// Optional API key (client ID).
    pub api_key: Option<String>,
    /// Optional API secret (client secret).
    pub api_secret: Option<String>,
    /// Whether the endpoint is the Deribit testnet.
    pub is_testnet: bool,
    /// Whether a supervisor should reconnect after the consume loop fails.
    pub auto_reconnect: bool,
    /// Logs every inbound frame at debug level (trace otherwise).
    pub debug_mode: bool,
    /// Timeout applied to the WebSocket dial.
    pub connect_timeout: Duration,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// Optional parent cancellation token; cancelling it closes the session.
    pub cancellation_token: Option<CancellationToken>,
    /// Reconnection backoff settings used by the supervisor.
    pub reconnect: ReconnectConfig,
}

impl Default for DeribitWsConfig {
    fn default() -> Self {
        Self {
            url: DERIBIT_WS_URL.to_string(),
            api_key: None,
            api_secret: None,
            is_testnet: false,
            auto_reconnect: false,
            debug_mode: false,
            connect_timeout: CONNECT_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
            cancellation_token: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl DeribitWsConfig {
    /// Creates a configuration for the given endpoint and credentials.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: Some(api_key.into()),
            api_secret: Some(api_secret.into()),
            ..Self::default()
        }
    }

    /// Creates a configuration with credentials loaded from the environment.
    ///
    /// - Testnet: `DERIBIT_TESTNET_API_KEY` and `DERIBIT_TESTNET_API_SECRET`
    /// - Mainnet: `DERIBIT_API_KEY` and `DERIBIT_API_SECRET`
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing.
    pub fn with_credentials(is_testnet: bool) -> anyhow::Result<Self> {
        let (key_env, secret_env) = if is_testnet {
            ("DERIBIT_TESTNET_API_KEY", "DERIBIT_TESTNET_API_SECRET")
        } else {
            ("DERIBIT_API_KEY", "DERIBIT_API_SECRET")
        };

        let api_key = env::var(key_env)
            .map_err(|_| anyhow::anyhow!("Missing environment variable: {key_env}"))?;
        let api_secret = env::var(secret_env)
            .map_err(|_| anyhow::anyhow!("Missing environment variable: {secret_env}"))?;

        let url = if is_testnet {
            DERIBIT_TESTNET_WS_URL
        } else {
            DERIBIT_WS_URL
        };

        Ok(Self {
            is_testnet,
            ..Self::new(url, api_key, api_secret)
        })
    }

    /// Returns the credential when both key and secret are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of `api_key` or `api_secret` is set.
    pub fn credential(&self) -> anyhow::Result<Option<Credential>> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Ok(Some(Credential::new(key.clone(), secret.clone()))),
            (None, None) => Ok(None),
            _ => anyhow::bail!("Both api_key and api_secret must be provided together, or neither"),
        }
    }
}

/// Configuration for automatic reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failed attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Initial backoff duration for first reconnection attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the backoff duration for a given attempt number.
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_secs = self.initial_backoff.as_secs_f64();
        let scaled = base_secs * self.backoff_multiplier.powi(exponent);

        if !scaled.is_finite() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_config() {
        let config = DeribitWsConfig::default();

        assert_eq!(config.url, DERIBIT_WS_URL);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 2_097_152);
        assert!(!config.auto_reconnect);
        assert!(config.credential().unwrap().is_none());
    }

    #[rstest]
    fn test_new_config_has_credential() {
        let config = DeribitWsConfig::new("ws://127.0.0.1:1/ws/api/v2", "key", "secret");
        let credential = config.credential().unwrap().unwrap();

        assert_eq!(credential.api_key(), "key");
        assert_eq!(credential.api_secret(), "secret");
    }

    #[rstest]
    fn test_partial_credentials_rejected() {
        let config = DeribitWsConfig {
            api_key: Some("key".to_string()),
            ..DeribitWsConfig::default()
        };

        assert!(config.credential().is_err());
    }

    #[rstest]
    #[case(0, Duration::from_secs(1))]
    #[case(1, Duration::from_secs(2))]
    #[case(2, Duration::from_secs(4))]
    #[case(3, Duration::from_secs(8))]
    fn test_backoff_calculation(#[case] attempt: u32, #[case] expected: Duration) {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_backoff(attempt), expected);
    }

    #[rstest]
    fn test_backoff_cap() {
        let config = ReconnectConfig::default();

        assert_eq!(config.calculate_backoff(10), Duration::from_secs(60));
        assert_eq!(config.calculate_backoff(u32::MAX), Duration::from_secs(60));
    }
}
