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

//! Channel subscription registry and typed notification dispatch.
//!
//! Handlers are keyed by the exact channel string. Several handlers may share a channel;
//! each notification reaches all of them in registration order, and every handler
//! receives its own decoded copy of the payload. Handlers run on the consume loop task,
//! so a slow handler delays every later message.

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use super::{
    enums::DeribitChannelKind,
    error::{DeribitWsError, DeribitWsResult},
    messages::{DeribitEvent, DeribitOrder, DeribitUserTrade},
};

/// Callback for `user.orders` notifications.
pub type OrderHandler = Arc<dyn Fn(DeribitOrder) + Send + Sync>;

/// Callback for `user.trades` notifications.
pub type UserTradesHandler = Arc<dyn Fn(Vec<DeribitUserTrade>) + Send + Sync>;

/// A typed notification handler.
///
/// The variant fixes the payload type and must agree with the channel prefix it is
/// registered under.
#[derive(Clone)]
pub enum ChannelHandler {
    Orders(OrderHandler),
    UserTrades(UserTradesHandler),
}

impl std::fmt::Debug for ChannelHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orders(_) => f.write_str("ChannelHandler::Orders"),
            Self::UserTrades(_) => f.write_str("ChannelHandler::UserTrades"),
        }
    }
}

impl ChannelHandler {
    /// Wraps a closure receiving [`DeribitOrder`] updates.
    pub fn orders<F>(handler: F) -> Self
    where
        F: Fn(DeribitOrder) + Send + Sync + 'static,
    {
        Self::Orders(Arc::new(handler))
    }

    /// Wraps a closure receiving batches of [`DeribitUserTrade`].
    pub fn user_trades<F>(handler: F) -> Self
    where
        F: Fn(Vec<DeribitUserTrade>) + Send + Sync + 'static,
    {
        Self::UserTrades(Arc::new(handler))
    }

    /// Returns the channel kind this handler accepts.
    #[must_use]
    pub const fn kind(&self) -> DeribitChannelKind {
        match self {
            Self::Orders(_) => DeribitChannelKind::UserOrders,
            Self::UserTrades(_) => DeribitChannelKind::UserTrades,
        }
    }

    fn invoke(&self, channel: &str, data: &RawValue) -> DeribitWsResult<()> {
        match self {
            Self::Orders(handler) => handler(decode_payload(channel, data)?),
            Self::UserTrades(handler) => handler(decode_payload(channel, data)?),
        }
        Ok(())
    }
}

fn validate_payload(
    kind: DeribitChannelKind,
    channel: &str,
    data: &RawValue,
) -> DeribitWsResult<()> {
    match kind {
        DeribitChannelKind::UserOrders => decode_payload::<DeribitOrder>(channel, data).map(drop),
        DeribitChannelKind::UserTrades => {
            decode_payload::<Vec<DeribitUserTrade>>(channel, data).map(drop)
        }
    }
}

fn decode_payload<T: DeserializeOwned>(channel: &str, data: &RawValue) -> DeribitWsResult<T> {
    serde_json::from_str(data.get())
        .map_err(|e| DeribitWsError::Json(format!("Failed to decode {channel} payload: {e}")))
}

/// Maps channels to their registered handlers.
///
/// Shared between a client and its supervisor so registrations survive reconnects.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handlers: DashMap<String, Vec<ChannelHandler>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the handlers bound to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::ClientError`] if the channel has no known prefix or the
    /// handler's payload type does not match it.
    pub fn register(&self, channel: &str, handler: ChannelHandler) -> DeribitWsResult<()> {
        validate_handler(channel, &handler)?;
        self.handlers
            .entry(channel.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Removes every handler bound to `channel`, returning how many were removed.
    pub fn remove(&self, channel: &str) -> usize {
        self.handlers
            .remove(channel)
            .map_or(0, |(_, handlers)| handlers.len())
    }

    /// Returns the channels with at least one handler, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .handlers
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        channels.sort();
        channels
    }

    /// Returns the number of handlers bound to `channel`.
    #[must_use]
    pub fn handler_count(&self, channel: &str) -> usize {
        self.handlers.get(channel).map_or(0, |h| h.len())
    }

    /// Returns whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.iter().all(|entry| entry.value().is_empty())
    }

    /// Delivers a notification to every handler bound to its channel.
    ///
    /// Returns the number of handlers invoked. Notifications for channels with an unknown
    /// prefix are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::Json`] if the payload is missing or does not decode into the
    /// type the channel prefix implies, whether or not any handler is bound. The first
    /// handler's decode fails before any handler runs.
    pub fn dispatch(&self, event: &DeribitEvent) -> DeribitWsResult<usize> {
        let Some(kind) = DeribitChannelKind::from_channel_string(&event.channel) else {
            tracing::warn!("Unknown channel, dropping notification: {}", event.channel);
            return Ok(0);
        };
        let data = event.payload()?;

        // Clone out so handlers may subscribe without deadlocking the shard
        let handlers = match self.handlers.get(&event.channel) {
            Some(handlers) => handlers.clone(),
            None => {
                validate_payload(kind, &event.channel, data)?;
                tracing::debug!("No handlers for {kind} channel {}", event.channel);
                return Ok(0);
            }
        };

        for handler in &handlers {
            handler.invoke(&event.channel, data)?;
        }

        Ok(handlers.len())
    }
}

/// Checks that `handler` accepts the payload type implied by the prefix of `channel`.
///
/// # Errors
///
/// Returns [`DeribitWsError::ClientError`] on an unknown prefix or a mismatched handler.
pub fn validate_handler(channel: &str, handler: &ChannelHandler) -> DeribitWsResult<()> {
    match DeribitChannelKind::from_channel_string(channel) {
        Some(kind) if kind == handler.kind() => Ok(()),
        Some(kind) => Err(DeribitWsError::ClientError(format!(
            "Handler for {} cannot be bound to {kind} channel {channel}",
            handler.kind()
        ))),
        None => Err(DeribitWsError::ClientError(format!(
            "Unsupported channel: {channel}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;

    const ORDERS_CHANNEL: &str = "user.orders.any.any.raw";

    fn event(channel: &str, data: &str) -> DeribitEvent {
        DeribitEvent {
            channel: channel.to_string(),
            data: Some(RawValue::from_string(data.to_string()).unwrap()),
        }
    }

    #[rstest]
    fn test_fan_out_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let calls = calls.clone();
            registry
                .register(
                    ORDERS_CHANNEL,
                    ChannelHandler::orders(move |order| {
                        calls.lock().unwrap().push(format!("{name}:{}", order.order_id));
                    }),
                )
                .unwrap();
        }

        let invoked = registry
            .dispatch(&event(ORDERS_CHANNEL, r#"{"order_id":"X"}"#))
            .unwrap();

        assert_eq!(invoked, 2);
        assert_eq!(*calls.lock().unwrap(), vec!["first:X", "second:X"]);
    }

    #[rstest]
    fn test_unknown_prefix_dropped() {
        let registry = SubscriptionRegistry::new();

        let invoked = registry
            .dispatch(&event("user.portfolio.btc", r#"{"equity":1.0}"#))
            .unwrap();

        assert_eq!(invoked, 0);
    }

    #[rstest]
    fn test_decode_failure_is_error() {
        let registry = SubscriptionRegistry::new();
        registry
            .register(ORDERS_CHANNEL, ChannelHandler::orders(|_| {}))
            .unwrap();

        let result = registry.dispatch(&event(ORDERS_CHANNEL, r#"{"price":1.0}"#));

        assert!(matches!(result, Err(DeribitWsError::Json(_))));
    }

    #[rstest]
    #[case("user.orders.future.BTC.raw", r#"{"price":1.0}"#)]
    #[case("user.trades.future.BTC.raw", r#"{"trade_id":"1"}"#)]
    fn test_decode_failure_without_handlers_is_error(#[case] channel: &str, #[case] data: &str) {
        let registry = SubscriptionRegistry::new();

        let result = registry.dispatch(&event(channel, data));

        assert!(matches!(result, Err(DeribitWsError::Json(_))));
    }

    #[rstest]
    fn test_valid_payload_without_handlers_dropped() {
        let registry = SubscriptionRegistry::new();

        let invoked = registry
            .dispatch(&event("user.orders.future.BTC.raw", r#"{"order_id":"X"}"#))
            .unwrap();

        assert_eq!(invoked, 0);
    }

    #[rstest]
    fn test_missing_payload_is_error() {
        let registry = SubscriptionRegistry::new();
        registry
            .register(ORDERS_CHANNEL, ChannelHandler::orders(|_| {}))
            .unwrap();
        let event = DeribitEvent {
            channel: ORDERS_CHANNEL.to_string(),
            data: None,
        };

        assert!(matches!(
            registry.dispatch(&event),
            Err(DeribitWsError::Json(_))
        ));
    }

    #[rstest]
    fn test_unknown_prefix_without_payload_dropped() {
        let registry = SubscriptionRegistry::new();
        let event = DeribitEvent {
            channel: "announcements".to_string(),
            data: None,
        };

        assert_eq!(registry.dispatch(&event).unwrap(), 0);
    }

    #[rstest]
    fn test_user_trades_dispatch() {
        let registry = SubscriptionRegistry::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let channel = "user.trades.future.BTC.raw";

        registry
            .register(
                channel,
                ChannelHandler::user_trades(move |trades| {
                    received_clone.lock().unwrap().extend(trades);
                }),
            )
            .unwrap();

        let data = r#"[{"trade_id":"1","order_id":"O1","instrument_name":"BTC-PERPETUAL","price":50000.0,"amount":10.0,"direction":"buy","timestamp":1}]"#;
        registry.dispatch(&event(channel, data)).unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].order_id, "O1");
    }

    #[rstest]
    #[case("user.trades.any.any.raw")]
    #[case("book.BTC-PERPETUAL.raw")]
    fn test_register_rejects_mismatched_handler(#[case] channel: &str) {
        let registry = SubscriptionRegistry::new();

        let result = registry.register(channel, ChannelHandler::orders(|_| {}));

        assert!(matches!(result, Err(DeribitWsError::ClientError(_))));
        assert!(registry.is_empty());
    }

    #[rstest]
    fn test_channels_and_remove() {
        let registry = SubscriptionRegistry::new();
        registry
            .register(ORDERS_CHANNEL, ChannelHandler::orders(|_| {}))
            .unwrap();
        registry
            .register(ORDERS_CHANNEL, ChannelHandler::orders(|_| {}))
            .unwrap();
        registry
            .register("user.trades.any.any.raw", ChannelHandler::user_trades(|_| {}))
            .unwrap();

        assert_eq!(
            registry.channels(),
            vec!["user.orders.any.any.raw", "user.trades.any.any.raw"]
        );
        assert_eq!(registry.handler_count(ORDERS_CHANNEL), 2);
        assert_eq!(registry.remove(ORDERS_CHANNEL), 2);
        assert_eq!(registry.handler_count(ORDERS_CHANNEL), 0);
        assert_eq!(registry.remove(ORDERS_CHANNEL), 0);
    }
}
