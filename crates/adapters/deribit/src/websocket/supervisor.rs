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

//! Reconnecting supervisor for Deribit user sessions.
//!
//! A [`DeribitUserWebsocket`] never reconnects on its own. The supervisor owns the
//! [`SubscriptionRegistry`] across sessions: each time the consume loop stops with a
//! retryable error it dials again, re-authenticates, replays every registered channel and
//! resumes consuming, honouring [`DeribitWsConfig::auto_reconnect`] and the
//! [`ReconnectConfig`](crate::config::ReconnectConfig) backoff.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;

use super::{
    client::DeribitUserWebsocket,
    dispatch::{ChannelHandler, SubscriptionRegistry},
    enums::DeribitChannelKind,
    error::{DeribitWsError, DeribitWsResult, should_reconnect_deribit_ws_error},
    messages::DeribitOrder,
};
use crate::config::DeribitWsConfig;

/// Lifecycle state of a supervised session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    /// No session and none being established.
    Disconnected,
    /// Dialing the endpoint.
    Connecting,
    /// Handshake succeeded, subscriptions being replayed.
    Authenticated,
    /// Consume loop running.
    Running,
    /// Waiting before the next attempt.
    Backoff {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },
}

/// Drives a [`DeribitUserWebsocket`] through reconnects, keeping subscriptions alive.
#[derive(Clone)]
pub struct DeribitWsSupervisor {
    config: DeribitWsConfig,
    registry: Arc<SubscriptionRegistry>,
    state_tx: Arc<watch::Sender<SupervisorState>>,
    client: Arc<RwLock<Option<DeribitUserWebsocket>>>,
    cancellation_token: CancellationToken,
}

impl std::fmt::Debug for DeribitWsSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitWsSupervisor))
            .field("url", &self.config.url)
            .field("auto_reconnect", &self.config.auto_reconnect)
            .field("state", &self.state())
            .field("channels", &self.registry.channels())
            .finish_non_exhaustive()
    }
}

impl DeribitWsSupervisor {
    /// Creates a supervisor for `config`. Nothing is dialed until [`Self::run`].
    #[must_use]
    pub fn new(mut config: DeribitWsConfig) -> Self {
        let cancellation_token = config
            .cancellation_token
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        config.cancellation_token = Some(cancellation_token.clone());

        let (state_tx, _) = watch::channel(SupervisorState::Disconnected);

        Self {
            config,
            registry: Arc::new(SubscriptionRegistry::new()),
            state_tx: Arc::new(state_tx),
            client: Arc::new(RwLock::new(None)),
            cancellation_token,
        }
    }

    /// Returns the registry shared by every session.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state_tx.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Returns the live session, if any.
    pub async fn client(&self) -> Option<DeribitUserWebsocket> {
        self.client.read().await.clone()
    }

    fn set_state(&self, state: SupervisorState) {
        tracing::debug!("Supervisor state: {state:?}");
        self.state_tx.send_replace(state);
    }

    /// Subscribes `handler` to `channel` on the live session and every later one.
    ///
    /// Without a live session the handler is only registered; the channel is sent once
    /// the next session is authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler does not match the channel prefix or the live
    /// session fails to send the request.
    pub async fn subscribe(&self, channel: &str, handler: ChannelHandler) -> DeribitWsResult<()> {
        if let Some(client) = self.client().await
            && client.is_connected()
        {
            return client.subscribe(channel, handler).await;
        }

        self.registry.register(channel, handler)
    }

    /// Subscribes to order updates on `user.orders.{kind}.{currency}.raw`.
    ///
    /// # Errors
    ///
    /// Returns an error if the live session fails to send the request.
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

    /// Runs sessions until shutdown or a terminal error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the last session when reconnection is disabled, the
    /// error is not retryable, or `max_attempts` consecutive attempts have failed.
    pub async fn run(&self) -> DeribitWsResult<()> {
        let mut failures: u32 = 0;

        loop {
            if self.cancellation_token.is_cancelled() {
                self.set_state(SupervisorState::Disconnected);
                return Ok(());
            }

            self.set_state(SupervisorState::Connecting);

            let error = match self.run_session(&mut failures).await {
                Some(error) => error,
                None => {
                    self.set_state(SupervisorState::Disconnected);
                    return Ok(());
                }
            };

            if self.cancellation_token.is_cancelled() {
                self.set_state(SupervisorState::Disconnected);
                return Ok(());
            }

            if !self.config.auto_reconnect || !should_reconnect_deribit_ws_error(&error) {
                self.set_state(SupervisorState::Disconnected);
                return Err(error);
            }

            failures = failures.saturating_add(1);

            if let Some(max) = self.config.reconnect.max_attempts
                && failures >= max
            {
                tracing::error!("Giving up after {failures} failed attempts: {error}");
                self.set_state(SupervisorState::Disconnected);
                return Err(error);
            }

            let backoff = self.config.reconnect.calculate_backoff(failures - 1);
            tracing::warn!("Session ended ({error}), reconnecting in {backoff:?}");
            self.set_state(SupervisorState::Backoff { attempt: failures });

            tokio::select! {
                () = self.cancellation_token.cancelled() => {
                    self.set_state(SupervisorState::Disconnected);
                    return Ok(());
                }
                () = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// Runs one session to completion, returning the error that ended it.
    ///
    /// Returns `None` if cancelled while connecting.
    async fn run_session(&self, failures: &mut u32) -> Option<DeribitWsError> {
        let connect =
            DeribitUserWebsocket::connect_with_registry(&self.config, self.registry.clone());

        let client = tokio::select! {
            () = self.cancellation_token.cancelled() => return None,
            result = connect => match result {
                Ok(client) => client,
                Err(e) => return Some(e),
            },
        };

        self.set_state(SupervisorState::Authenticated);
        *self.client.write().await = Some(client.clone());

        let outcome = match client.resubscribe_all().await {
            Ok(_) => {
                *failures = 0;
                self.set_state(SupervisorState::Running);
                client.start_consume_events().await
            }
            Err(e) => Err(e),
        };

        client.close().await;
        *self.client.write().await = None;

        Some(outcome.err().unwrap_or(DeribitWsError::Closed))
    }

    /// Stops the supervisor and closes the live session.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down Deribit WebSocket supervisor");
        self.cancellation_token.cancel();

        if let Some(client) = self.client().await {
            client.close().await;
        }
    }
}
