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

//! Deribit user WebSocket session.
//!
//! Layers, leaves first:
//! - [`transport`]: the raw text-frame duplex with a read-size ceiling.
//! - [`auth`]: the one-shot `client_credentials` handshake.
//! - [`messages`]: JSON-RPC encoding and inbound classification.
//! - [`dispatch`]: channel to handler registry and typed fan-out.
//! - [`pending`]: request ID correlation for RPC calls made while the loop runs.
//! - [`client`]: the session orchestrator and consume loop.
//! - [`supervisor`]: reconnection, re-authentication and subscription replay.

pub mod auth;
pub mod client;
pub mod dispatch;
pub mod enums;
pub mod error;
pub mod messages;
pub mod pending;
pub mod supervisor;
pub mod transport;

pub use client::DeribitUserWebsocket;
pub use dispatch::{ChannelHandler, SubscriptionRegistry};
pub use error::{DeribitWsError, DeribitWsResult};
pub use supervisor::{DeribitWsSupervisor, SupervisorState};
