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

//! Data structures for Deribit WebSocket JSON-RPC messages.

use serde::{Deserialize, Serialize};
use serde_json::{Value, error::Category, value::RawValue};
use ustr::Ustr;

use super::{
    enums::{DeribitChannelKind, DeribitDirection, DeribitOrderState},
    error::{DeribitWsError, DeribitWsResult},
};
pub use crate::common::rpc::{DeribitJsonRpcError, DeribitJsonRpcRequest, DeribitJsonRpcResponse};
use crate::common::consts::METHOD_SUBSCRIPTION;

/// Authentication request parameters for the `client_credentials` grant.
#[derive(Clone, Serialize)]
pub struct DeribitAuthParams {
    /// Grant type (always "client_credentials").
    pub grant_type: String,
    /// Client ID (API key).
    pub client_id: String,
    /// Client secret (API secret).
    pub client_secret: String,
}

impl std::fmt::Debug for DeribitAuthParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitAuthParams))
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Authentication response result.
///
/// Every field defaults so that a result without a token decodes and is rejected by
/// the handshake instead of failing as malformed JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeribitAuthResult {
    /// Access token.
    #[serde(default)]
    pub access_token: String,
    /// Token expiration time in seconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Granted scope.
    #[serde(default)]
    pub scope: String,
    /// Token type (bearer).
    #[serde(default)]
    pub token_type: String,
    /// Enabled features.
    #[serde(default)]
    pub enabled_features: Vec<String>,
}

/// Subscription request parameters, shared by subscribe and unsubscribe.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitSubscribeParams {
    /// List of channels to subscribe to.
    pub channels: Vec<String>,
}

/// Parameters of a `subscription` notification.
///
/// The payload is kept undecoded; its type depends on the channel prefix and each
/// handler decodes its own copy.
#[derive(Debug, Deserialize)]
pub struct DeribitEvent {
    /// Channel name (e.g., "user.orders.any.any.raw").
    pub channel: String,
    /// Channel-specific data. Only channels with a known prefix must carry it.
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl DeribitEvent {
    /// Returns the undecoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::Json`] if the notification carried no `data`.
    pub fn payload(&self) -> DeribitWsResult<&RawValue> {
        self.data.as_deref().ok_or_else(|| {
            DeribitWsError::Json(format!("{} notification without data", self.channel))
        })
    }
}

/// Order price, either a limit price or the literal `market_price`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeribitOrderPrice {
    Limit(f64),
    Market(String),
}

/// Order update from `user.orders.{kind}.{currency}.raw` channels.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitOrder {
    /// Unique order identifier.
    pub order_id: String,
    pub instrument_name: Option<Ustr>,
    pub direction: Option<DeribitDirection>,
    pub order_state: Option<DeribitOrderState>,
    /// Order type (e.g., "limit", "market", "stop_limit").
    pub order_type: Option<String>,
    pub time_in_force: Option<String>,
    pub price: Option<DeribitOrderPrice>,
    pub amount: Option<f64>,
    pub filled_amount: Option<f64>,
    pub average_price: Option<f64>,
    pub label: Option<String>,
    pub post_only: Option<bool>,
    pub reduce_only: Option<bool>,
    pub is_liquidation: Option<bool>,
    pub api: Option<bool>,
    /// Creation time in milliseconds.
    pub creation_timestamp: Option<u64>,
    /// Last update time in milliseconds.
    pub last_update_timestamp: Option<u64>,
}

/// Trade (fill) from `user.trades.{kind}.{currency}.raw` channels.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitUserTrade {
    /// Trade ID.
    pub trade_id: String,
    /// ID of the order that was filled.
    pub order_id: String,
    /// Instrument name.
    pub instrument_name: Ustr,
    /// Fill price.
    pub price: f64,
    /// Fill amount (contracts).
    pub amount: f64,
    /// Trade direction.
    pub direction: DeribitDirection,
    /// Trade timestamp in milliseconds.
    pub timestamp: u64,
    pub trade_seq: Option<u64>,
    pub fee: Option<f64>,
    pub fee_currency: Option<Ustr>,
    /// "M" for maker, "T" for taker.
    pub liquidity: Option<String>,
    pub order_type: Option<String>,
    pub label: Option<String>,
    pub index_price: Option<f64>,
    pub mark_price: Option<f64>,
}

#[derive(Deserialize)]
struct DeribitInboundRequest {
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Option<Box<RawValue>>,
}

/// Classified inbound WebSocket message.
#[derive(Debug)]
pub enum DeribitWsMessage {
    /// Reply to a request carrying a present ID.
    Response(DeribitJsonRpcResponse<Value>),
    /// `subscription` notification.
    Notification(DeribitEvent),
    /// Well-formed message of no known shape, logged by the consume loop.
    Unrecognized {
        /// Method name if the message had one.
        method: String,
    },
}

/// Encodes a JSON-RPC 2.0 request as a text frame payload.
///
/// # Errors
///
/// Returns an error if `params` fails to serialize.
pub fn encode_request<T: Serialize>(id: u64, method: &str, params: T) -> DeribitWsResult<String> {
    let request = DeribitJsonRpcRequest::new(id, method, params);
    Ok(serde_json::to_string(&request)?)
}

/// Classifies a raw inbound text frame.
///
/// Well-formed JSON always classifies: a present ID makes a [`DeribitWsMessage::Response`],
/// a `subscription` method makes a [`DeribitWsMessage::Notification`] and anything else is
/// [`DeribitWsMessage::Unrecognized`].
///
/// # Errors
///
/// Returns [`DeribitWsError::Json`] if the text is not valid JSON, if a `subscription`
/// message lacks a `channel`, or if a channel with a known prefix carries no `data`.
pub fn classify_raw_message(text: &str) -> DeribitWsResult<DeribitWsMessage> {
    let response = match serde_json::from_str::<DeribitJsonRpcResponse<Value>>(text) {
        Ok(response) => Some(response),
        Err(e) if e.classify() == Category::Data => None,
        Err(e) => return Err(e.into()),
    };

    if let Some(response) = response
        && response.present_id().is_some()
    {
        return Ok(DeribitWsMessage::Response(response));
    }

    let request = match serde_json::from_str::<DeribitInboundRequest>(text) {
        Ok(request) => request,
        Err(e) if e.classify() == Category::Data => {
            return Ok(DeribitWsMessage::Unrecognized {
                method: String::new(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if request.method != METHOD_SUBSCRIPTION {
        return Ok(DeribitWsMessage::Unrecognized {
            method: request.method,
        });
    }

    let params = request.params.ok_or_else(|| {
        DeribitWsError::Json("subscription notification without params".to_string())
    })?;
    let event: DeribitEvent = serde_json::from_str(params.get())?;

    if DeribitChannelKind::from_channel_string(&event.channel).is_some() {
        event.payload()?;
    }

    Ok(DeribitWsMessage::Notification(event))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::common::rpc::DeribitRequestId;

    fn load_test_json(filename: &str) -> String {
        let path = format!("{}/test_data/{filename}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load test data from {path}: {e}"))
    }

    #[rstest]
    fn test_encode_auth_request() {
        let params = DeribitAuthParams {
            grant_type: "client_credentials".to_string(),
            client_id: "key".to_string(),
            client_secret: "secret".to_string(),
        };
        let text = encode_request(1, "/public/auth", params).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "/public/auth",
                "params": {
                    "grant_type": "client_credentials",
                    "client_id": "key",
                    "client_secret": "secret"
                }
            })
        );
    }

    #[rstest]
    fn test_auth_params_debug_redacts_secret() {
        let params = DeribitAuthParams {
            grant_type: "client_credentials".to_string(),
            client_id: "key".to_string(),
            client_secret: "very_secret".to_string(),
        };
        let debug = format!("{params:?}");

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("very_secret"));
    }

    #[rstest]
    fn test_classify_response_with_result() {
        let json = load_test_json("ws_auth_response.json");

        match classify_raw_message(&json).unwrap() {
            DeribitWsMessage::Response(response) => {
                assert_eq!(response.id, Some(DeribitRequestId::Num(1)));
                let result: DeribitAuthResult =
                    serde_json::from_value(response.result.unwrap()).unwrap();
                assert_eq!(result.access_token, "test_access_token");
                assert_eq!(result.expires_in, 900);
            }
            other => panic!("Expected response, was {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_response_with_error() {
        let json = load_test_json("ws_error_response.json");

        match classify_raw_message(&json).unwrap() {
            DeribitWsMessage::Response(response) => {
                let error = response.error.unwrap();
                assert_eq!(error.code, 11050);
                assert_eq!(error.message, "bad_request");
            }
            other => panic!("Expected response, was {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_string_id_response() {
        let json = r#"{"jsonrpc":"2.0","id":"req-1","result":[]}"#;

        assert!(matches!(
            classify_raw_message(json).unwrap(),
            DeribitWsMessage::Response(_)
        ));
    }

    #[rstest]
    fn test_classify_order_notification() {
        let json = load_test_json("ws_user_orders.json");

        match classify_raw_message(&json).unwrap() {
            DeribitWsMessage::Notification(event) => {
                assert_eq!(event.channel, "user.orders.any.any.raw");
                let order: DeribitOrder =
                    serde_json::from_str(event.payload().unwrap().get()).unwrap();
                assert_eq!(order.order_id, "ETH-584849853");
                assert_eq!(order.instrument_name, Some(Ustr::from("ETH-PERPETUAL")));
                assert_eq!(order.direction, Some(DeribitDirection::Buy));
                assert_eq!(order.order_state, Some(DeribitOrderState::Open));
                assert_eq!(order.price, Some(DeribitOrderPrice::Limit(3200.5)));
            }
            other => panic!("Expected notification, was {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_zero_id_subscription() {
        let json = r#"{"jsonrpc":"2.0","id":0,"method":"subscription","params":{"channel":"user.orders.any.any.raw","data":{"order_id":"X"}}}"#;

        match classify_raw_message(json).unwrap() {
            DeribitWsMessage::Notification(event) => {
                assert_eq!(event.payload().unwrap().get(), r#"{"order_id":"X"}"#);
            }
            other => panic!("Expected notification, was {other:?}"),
        }
    }

    #[rstest]
    #[case(r#"{"jsonrpc":"2.0","method":"heartbeat","params":{"type":"test_request"}}"#, "heartbeat")]
    #[case(r#"{"jsonrpc":"2.0","id":0,"result":"ok"}"#, "")]
    #[case(r#"{"jsonrpc":"2.0"}"#, "")]
    #[case(r#"[1, 2, 3]"#, "")]
    #[case(r#""text""#, "")]
    fn test_classify_unrecognized(#[case] json: &str, #[case] expected_method: &str) {
        match classify_raw_message(json).unwrap() {
            DeribitWsMessage::Unrecognized { method } => assert_eq!(method, expected_method),
            other => panic!("Expected unrecognized, was {other:?}"),
        }
    }

    #[rstest]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"announcements"}}"#)]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"announcements","data":null}}"#)]
    fn test_classify_unknown_channel_without_data(#[case] json: &str) {
        match classify_raw_message(json).unwrap() {
            DeribitWsMessage::Notification(event) => {
                assert_eq!(event.channel, "announcements");
                assert!(event.data.is_none());
                assert!(matches!(event.payload(), Err(DeribitWsError::Json(_))));
            }
            other => panic!("Expected notification, was {other:?}"),
        }
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription""#)]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription"}"#)]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"user.orders.any.any.raw"}}"#)]
    #[case(r#"{"jsonrpc":"2.0","method":"subscription","params":[1]}"#)]
    fn test_classify_decode_failure(#[case] json: &str) {
        assert!(matches!(
            classify_raw_message(json),
            Err(DeribitWsError::Json(_))
        ));
    }

    #[rstest]
    fn test_user_trades_deserialization() {
        let json = load_test_json("ws_user_trades.json");

        match classify_raw_message(&json).unwrap() {
            DeribitWsMessage::Notification(event) => {
                assert_eq!(event.channel, "user.trades.future.BTC.raw");
                let trades: Vec<DeribitUserTrade> =
                    serde_json::from_str(event.payload().unwrap().get()).unwrap();
                assert_eq!(trades.len(), 1);
                assert_eq!(trades[0].trade_id, "BTC-90221431");
                assert_eq!(trades[0].order_id, "BTC-31462921");
                assert_eq!(trades[0].direction, DeribitDirection::Sell);
                assert_eq!(trades[0].liquidity.as_deref(), Some("T"));
            }
            other => panic!("Expected notification, was {other:?}"),
        }
    }

    #[rstest]
    fn test_market_order_price() {
        let json = r#"{"order_id":"BTC-1","price":"market_price"}"#;
        let order: DeribitOrder = serde_json::from_str(json).unwrap();

        assert_eq!(
            order.price,
            Some(DeribitOrderPrice::Market("market_price".to_string()))
        );
    }
}
