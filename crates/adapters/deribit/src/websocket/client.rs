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

//! Authenticated Deribit user WebSocket session.
//!
//! [`DeribitUserWebsocket::connect`] dials and authenticates before returning, so a client
//! value always refers to an authenticated session. Notifications only flow once
//! [`DeribitUserWebsocket::start_consume_events`] is awaited, typically on a spawned task:
//!
//! ```no_run
//! use deribit_ws::{config::DeribitWsConfig, websocket::DeribitUserWebsocket};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = DeribitWsConfig::with_credentials(true)?;
//! let client = DeribitUserWebsocket::connect(&config).await?;
//! client
//!     .subscribe_user_orders("any", "any", |order| println!("{}", order.order_id))
//!     .await?;
//!
//! let consumer = client.clone();
//! let handle = tokio::spawn(async move { consumer.start_consume_events().await });
//! // ...
//! client.close().await;
//! let _ = handle.await?;
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{
    auth::{AuthState, authenticate},
    dispatch::{ChannelHandler, SubscriptionRegistry, validate_handler},
    enums::DeribitChannelKind,
    error::{DeribitWsError, DeribitWsResult},
    messages::{
        DeribitJsonRpcResponse, DeribitOrder, DeribitSubscribeParams, DeribitUserTrade,
        DeribitWsMessage, classify_raw_message, encode_request,
    },
    pending::PendingCalls,
    transport::DeribitWsTransport,
};
use crate::{
    common::{
        consts::{DEFAULT_CALL_TIMEOUT, METHOD_SUBSCRIBE, METHOD_UNSUBSCRIBE},
        rpc::DeribitRequestId,
    },
    config::DeribitWsConfig,
};

/// WebSocket client for a single authenticated Deribit user session.
///
/// Clones share the same connection, registry and state.
#[derive(Clone)]
pub struct DeribitUserWebsocket {
    url: String,
    debug_mode: bool,
    transport: Arc<DeribitWsTransport>,
    is_connected: Arc<AtomicBool>,
    auth_state: AuthState,
    registry: Arc<SubscriptionRegistry>,
    pending: Arc<PendingCalls>,
    request_id_counter: Arc<AtomicU64>,
    cancellation_token: CancellationToken,
}

impl Debug for DeribitUserWebsocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitUserWebsocket))
            .field("url", &self.url)
            .field("is_connected", &self.is_connected.load(Ordering::Acquire))
            .field("channels", &self.registry.channels())
            .field("pending_calls", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DeribitUserWebsocket {
    /// Connects to Deribit and authenticates with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the dial fails or times out, or the
    /// handshake is rejected. The connection is closed before returning an error.
    pub async fn connect(config: &DeribitWsConfig) -> DeribitWsResult<Self> {
        Self::connect_with_registry(config, Arc::new(SubscriptionRegistry::new())).await
    }

    /// Connects and authenticates, dispatching notifications through `registry`.
    ///
    /// Existing registrations are not re-sent to the server; see [`Self::resubscribe_all`].
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the dial fails or times out, or the
    /// handshake is rejected.
    pub async fn connect_with_registry(
        config: &DeribitWsConfig,
        registry: Arc<SubscriptionRegistry>,
    ) -> DeribitWsResult<Self> {
        let credential = config
            .credential()
            .map_err(|e| DeribitWsError::ClientError(e.to_string()))?
            .ok_or_else(|| {
                DeribitWsError::Authentication("API credentials not configured".to_string())
            })?;

        let cancellation_token = config
            .cancellation_token
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);

        tracing::info!("Connecting to Deribit WebSocket: {}", config.url);

        let transport = DeribitWsTransport::connect(
            &config.url,
            config.connect_timeout,
            config.max_message_size,
            cancellation_token.clone(),
        )
        .await?;

        let request_id_counter = Arc::new(AtomicU64::new(1));
        let request_id = request_id_counter.fetch_add(1, Ordering::Relaxed);

        let auth_state = match authenticate(&transport, &credential, request_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket authentication failed");
                transport.close().await;
                return Err(e);
            }
        };

        tracing::info!(
            "WebSocket authenticated with API key {} (expires in {}s)",
            credential.api_key_masked(),
            auth_state.expires_in
        );

        Ok(Self {
            url: config.url.clone(),
            debug_mode: config.debug_mode,
            transport: Arc::new(transport),
            is_connected: Arc::new(AtomicBool::new(true)),
            auth_state,
            registry,
            pending: Arc::new(PendingCalls::new()),
            request_id_counter,
            cancellation_token,
        })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns whether the session is authenticated and the consume loop has not stopped.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    /// Returns the tokens obtained by the handshake.
    #[must_use]
    pub fn auth_state(&self) -> &AuthState {
        &self.auth_state
    }

    /// Returns the access token obtained by the handshake.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.auth_state.access_token
    }

    /// Returns the subscription registry used for dispatch.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the token that stops this session when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    fn next_request_id(&self) -> u64 {
        self.request_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_connected(&self) -> DeribitWsResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DeribitWsError::NotConnected)
        }
    }

    async fn send_request<T: serde::Serialize>(
        &self,
        id: u64,
        method: &str,
        params: T,
    ) -> DeribitWsResult<()> {
        let payload = encode_request(id, method, params)?;
        if self.debug_mode {
            tracing::debug!("Sending: {payload}");
        }
        self.transport.write_text(payload).await
    }

    // ------------------------------------------------------------------------------------------------
    // Subscription Methods
    // ------------------------------------------------------------------------------------------------

    /// Subscribes `handler` to `channel`.
    ///
    /// Sends `/private/subscribe` and registers the handler without waiting for the
    /// acknowledgement. Subscribing again to the same channel adds another handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler does not match the channel prefix, the session is
    /// not connected, or the request cannot be written.
    pub async fn subscribe(&self, channel: &str, handler: ChannelHandler) -> DeribitWsResult<()> {
        validate_handler(channel, &handler)?;
        self.ensure_connected()?;

        let params = DeribitSubscribeParams {
            channels: vec![channel.to_string()],
        };
        self.send_request(self.next_request_id(), METHOD_SUBSCRIBE, params)
            .await?;

        self.registry.register(channel, handler)?;
        tracing::debug!("Subscribed to {channel}");
        Ok(())
    }

    /// Subscribes to order updates on `user.orders.{kind}.{currency}.raw`.
    ///
    /// `kind` is an instrument kind (`future`, `option`, `spot`, `any`, ...) and `currency`
    /// a currency code or `any`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the request cannot be written.
    pub async fn subscribe_user_orders<F>(
        &self,
        kind: &str,
        currency: &str,
        handler: F,
    ) -> DeribitWsResult<()>
    where
        F: Fn(DeribitOrder) + Send + Sync + 'static,
    {
        let channel = DeribitChannelKind::UserOrders.format_channel(kind, currency);
        self.subscribe(&channel, ChannelHandler::orders(handler))
            .await
    }

    /// Subscribes to fills on `user.trades.{kind}.{currency}.raw`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the request cannot be written.
    pub async fn subscribe_user_trades<F>(
        &self,
        kind: &str,
        currency: &str,
        handler: F,
    ) -> DeribitWsResult<()>
    where
        F: Fn(Vec<DeribitUserTrade>) + Send + Sync + 'static,
    {
        let channel = DeribitChannelKind::UserTrades.format_channel(kind, currency);
        self.subscribe(&channel, ChannelHandler::user_trades(handler))
            .await
    }

    /// Unsubscribes from `channel` and removes every handler bound to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the request cannot be written.
    pub async fn unsubscribe(&self, channel: &str) -> DeribitWsResult<()> {
        self.ensure_connected()?;

        let params = DeribitSubscribeParams {
            channels: vec![channel.to_string()],
        };
        self.send_request(self.next_request_id(), METHOD_UNSUBSCRIBE, params)
            .await?;

        let removed = self.registry.remove(channel);
        tracing::debug!("Unsubscribed from {channel} ({removed} handlers removed)");
        Ok(())
    }

    /// Re-sends `/private/subscribe` for every channel in the registry.
    ///
    /// Returns the number of channels sent. Handlers are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the request cannot be written.
    pub async fn resubscribe_all(&self) -> DeribitWsResult<usize> {
        self.ensure_connected()?;

        let channels = self.registry.channels();
        if channels.is_empty() {
            return Ok(0);
        }

        let count = channels.len();
        tracing::info!("Resubscribing to {count} channels");
        self.send_request(
            self.next_request_id(),
            METHOD_SUBSCRIBE,
            DeribitSubscribeParams { channels },
        )
        .await?;

        Ok(count)
    }

    /// Sends an arbitrary JSON-RPC request and waits for its response.
    ///
    /// Responses are only read by the consume loop, so [`Self::start_consume_events`] must
    /// be running for this to complete. `timeout` defaults to 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns the server's error object as [`DeribitWsError::DeribitError`],
    /// [`DeribitWsError::Timeout`] if no response arrives within `timeout`, or
    /// [`DeribitWsError::NotConnected`] if the session stops first.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> DeribitWsResult<Value> {
        self.ensure_connected()?;

        let timeout = timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        let id = self.next_request_id();
        let rx = self.pending.register(id);

        if let Err(e) = self.send_request(id, method, params).await {
            self.pending.cancel(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeribitWsError::NotConnected),
            Err(_) => {
                self.pending.cancel(id);
                Err(DeribitWsError::Timeout(format!(
                    "No response to {method} (request {id}) within {timeout:?}"
                )))
            }
        }
    }

    // ------------------------------------------------------------------------------------------------
    // Consume Loop
    // ------------------------------------------------------------------------------------------------

    /// Reads and routes inbound messages until a fatal error.
    ///
    /// Notifications are dispatched to registered handlers on this task. Responses to
    /// [`Self::call`] are delivered to their callers. The loop never retries: on return the
    /// session is marked disconnected, outstanding calls fail with
    /// [`DeribitWsError::NotConnected`] and the connection is closed.
    ///
    /// # Errors
    ///
    /// - [`DeribitWsError::Read`] on transport failure, including frames over the size limit.
    /// - [`DeribitWsError::Closed`] after [`Self::close`].
    /// - [`DeribitWsError::Json`] for malformed messages or undecodable payloads.
    /// - [`DeribitWsError::DeribitError`] for an error response no caller is waiting on.
    pub async fn start_consume_events(&self) -> DeribitWsResult<()> {
        tracing::debug!("Consume loop started");

        let result = self.consume().await;

        self.is_connected.store(false, Ordering::Release);
        self.pending.fail_all(&DeribitWsError::NotConnected);
        self.transport.close().await;

        match &result {
            Err(DeribitWsError::Closed) => tracing::info!("Consume loop stopped: connection closed"),
            Err(e) => tracing::error!(error = %e, "Consume loop stopped"),
            Ok(()) => {}
        }

        result
    }

    async fn consume(&self) -> DeribitWsResult<()> {
        loop {
            let text = self.transport.read_text().await?;

            if self.debug_mode {
                tracing::debug!("Received: {text}");
            } else {
                tracing::trace!("Received: {text}");
            }

            match classify_raw_message(&text)? {
                DeribitWsMessage::Response(response) => self.handle_response(response)?,
                DeribitWsMessage::Notification(event) => {
                    self.registry.dispatch(&event)?;
                }
                DeribitWsMessage::Unrecognized { method } => {
                    tracing::debug!("Unrecognized message: method={method:?}");
                }
            }
        }
    }

    fn handle_response(&self, response: DeribitJsonRpcResponse<Value>) -> DeribitWsResult<()> {
        let DeribitJsonRpcResponse {
            id, result, error, ..
        } = response;

        if let Some(num) = id.as_ref().and_then(DeribitRequestId::as_u64)
            && self.pending.contains(num)
        {
            let outcome = match error {
                Some(error) => Err(error.into()),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            self.pending.complete(num, outcome);
            return Ok(());
        }

        let id = id.map(|id| id.to_string()).unwrap_or_default();

        if let Some(error) = error {
            tracing::debug!("Unmatched error response for request {id}");
            return Err(error.into());
        }

        let result = result.unwrap_or(Value::Null);
        tracing::debug!("Response for request {id}: {result}");
        Ok(())
    }

    /// Closes the session, unblocking a running consume loop.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        if self.is_connected.swap(false, Ordering::AcqRel) {
            tracing::info!("Closing Deribit WebSocket connection");
        }
        self.transport.close().await;
    }
}
