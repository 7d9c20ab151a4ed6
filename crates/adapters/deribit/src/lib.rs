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

//! User WebSocket client for the [Deribit](https://www.deribit.com) v2 API.
//!
//! The `deribit-ws` crate maintains one authenticated JSON-RPC 2.0 session over a WebSocket,
//! lets callers bind handlers to private user channels, and demultiplexes inbound frames into
//! RPC responses or channel notifications:
//!
//! - [`websocket::client::DeribitUserWebsocket`]: connect, authenticate, subscribe and run the
//!   consume loop.
//! - [`websocket::dispatch::SubscriptionRegistry`]: channel to handler fan-out with typed
//!   payload decoding resolved by channel prefix.
//! - [`websocket::supervisor::DeribitWsSupervisor`]: optional reconnecting wrapper which
//!   re-authenticates and replays subscriptions after a dropped session.
//!
//! # Documentation
//!
//! - API reference: <https://docs.deribit.com/>

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod config;
pub mod websocket;
