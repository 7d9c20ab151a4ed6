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

//! Core constants for the Deribit user WebSocket client.

use std::time::Duration;

// Production URLs
pub const DERIBIT_WS_URL: &str = "wss://www.deribit.com/ws/api/v2";

// Testnet URLs
pub const DERIBIT_TESTNET_WS_URL: &str = "wss://test.deribit.com/ws/api/v2";

// JSON-RPC constants
pub const JSONRPC_VERSION: &str = "2.0";

// JSON-RPC methods
pub const METHOD_AUTH: &str = "/public/auth";
pub const METHOD_SUBSCRIBE: &str = "/private/subscribe";
pub const METHOD_UNSUBSCRIBE: &str = "/private/unsubscribe";

/// Method carried by server-pushed channel notifications.
pub const METHOD_SUBSCRIPTION: &str = "subscription";

/// Grant type used for the credential handshake.
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Error message returned when the handshake yields no access token.
pub const AUTHENTICATE_FAILED: &str = "Authenticate Failed";

/// Maximum size of a single inbound WebSocket message (2 MiB).
pub const MAX_MESSAGE_SIZE: usize = 32_768 * 64;

/// Timeout applied to the initial WebSocket dial.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout applied to correlated RPC calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
