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

//! Enumerations for Deribit user channels and payload fields.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Deribit private user channels with a typed payload.
///
/// Channels follow the format: `{prefix}.{kind}.{currency}.{interval}`, for example
/// `user.orders.future.BTC.raw`. The prefix selects the payload type during dispatch.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString)]
pub enum DeribitChannelKind {
    /// User order updates: `user.orders.{kind}.{currency}.raw`, one order per notification.
    UserOrders,
    /// User trades/fills: `user.trades.{kind}.{currency}.raw`, a batch per notification.
    UserTrades,
}

impl DeribitChannelKind {
    /// Returns the channel namespace prefix.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::UserOrders => "user.orders",
            Self::UserTrades => "user.trades",
        }
    }

    /// Formats the raw channel name for the given instrument kind and currency.
    ///
    /// Deribit accepts `any` for both components.
    #[must_use]
    pub fn format_channel(&self, kind: &str, currency: &str) -> String {
        format!("{}.{kind}.{currency}.raw", self.prefix())
    }

    /// Resolves the channel kind from a full channel name by prefix.
    #[must_use]
    pub fn from_channel_string(channel: &str) -> Option<Self> {
        Self::iter().find(|kind| channel.starts_with(kind.prefix()))
    }
}

/// Order or trade direction.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeribitDirection {
    Buy,
    Sell,
    /// Reported for some combo and settlement records.
    Zero,
}

/// Order state reported on `user.orders` channels.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeribitOrderState {
    Open,
    Filled,
    Rejected,
    Cancelled,
    Untriggered,
    Triggered,
    Archive,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_format_channel() {
        assert_eq!(
            DeribitChannelKind::UserOrders.format_channel("any", "any"),
            "user.orders.any.any.raw"
        );
        assert_eq!(
            DeribitChannelKind::UserTrades.format_channel("future", "BTC"),
            "user.trades.future.BTC.raw"
        );
    }

    #[rstest]
    #[case("user.orders.any.any.raw", Some(DeribitChannelKind::UserOrders))]
    #[case("user.orders.BTC-PERPETUAL.100ms", Some(DeribitChannelKind::UserOrders))]
    #[case("user.trades.option.ETH.raw", Some(DeribitChannelKind::UserTrades))]
    #[case("user.portfolio.btc", None)]
    #[case("trades.BTC-PERPETUAL.raw", None)]
    #[case("", None)]
    fn test_from_channel_string(#[case] channel: &str, #[case] expected: Option<DeribitChannelKind>) {
        assert_eq!(DeribitChannelKind::from_channel_string(channel), expected);
    }

    #[rstest]
    fn test_order_state_deserialization() {
        let state: DeribitOrderState = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(state, DeribitOrderState::Cancelled);
        assert_eq!(state.to_string(), "cancelled");
    }
}
