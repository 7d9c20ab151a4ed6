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

//! Deribit API credential storage for the `client_credentials` handshake.

use core::fmt::Debug;

use zeroize::ZeroizeOnDrop;

/// API credentials used once per WebSocket handshake.
///
/// The secret is sent in clear inside the TLS session (`client_credentials` grant), so it is
/// never logged and is zeroed when the credential is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Credential {
    api_key: Box<str>,
    api_secret: Box<str>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Credential))
            .field("api_key", &self.api_key_masked())
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a new [`Credential`] instance from the API key and secret.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().into_boxed_str(),
            api_secret: api_secret.into().into_boxed_str(),
        }
    }

    /// Returns the API key (client ID).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the API secret (client secret).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Returns a masked version of the API key for logging purposes.
    ///
    /// Shows first 4 and last 4 characters with ellipsis in between.
    /// For keys of 8 characters or fewer, shows asterisks only.
    #[must_use]
    pub fn api_key_masked(&self) -> String {
        let key = self.api_key.as_ref();
        let len = key.chars().count();

        if len <= 8 {
            "*".repeat(len)
        } else {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().skip(len - 4).collect();
            format!("{head}...{tail}")
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const API_KEY: &str = "AsJTU16U_test_key";
    const API_SECRET: &str = "mM5_K8LVxztN6Tjj";

    #[rstest]
    fn test_credential_creation() {
        let credential = Credential::new(API_KEY, API_SECRET);

        assert_eq!(credential.api_key(), API_KEY);
        assert_eq!(credential.api_secret(), API_SECRET);
    }

    #[rstest]
    #[case("AsJTU16U_test_key", "AsJT..._key")]
    #[case("AsJTU16U", "********")]
    #[case("", "")]
    fn test_api_key_masked(#[case] key: &str, #[case] expected: &str) {
        let credential = Credential::new(key, API_SECRET);
        assert_eq!(credential.api_key_masked(), expected);
    }

    #[rstest]
    fn test_debug_does_not_leak_secret() {
        let credential = Credential::new(API_KEY, API_SECRET);
        let debug_string = format!("{credential:?}");

        assert!(!debug_string.contains(API_SECRET));
        assert!(!debug_string.contains(API_KEY));
        assert!(debug_string.contains("<redacted>"));
    }
}
