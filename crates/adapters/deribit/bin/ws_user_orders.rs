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

//! Example binary streaming the authenticated user's order updates from Deribit.
//!
//! # Environment Variables
//!
//! - `DERIBIT_TESTNET_API_KEY` / `DERIBIT_TESTNET_API_SECRET` with `--testnet`
//! - `DERIBIT_API_KEY` / `DERIBIT_API_SECRET` otherwise
//! - `RUST_LOG` to override the log filter (default `info`)
//!
//! # Usage
//!
//! ```bash
//! cargo run -p deribit-ws --bin deribit-ws-user-orders -- --testnet
//!
//! # Reconnect and replay subscriptions when the session drops
//! cargo run -p deribit-ws --bin deribit-ws-user-orders -- --testnet --reconnect
//! ```

use std::env;

use deribit_ws::{
    config::DeribitWsConfig,
    websocket::{DeribitUserWebsocket, DeribitWsSupervisor},
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let is_testnet = args.iter().any(|a| a == "--testnet");
    let reconnect = args.iter().any(|a| a == "--reconnect");
    let debug_mode = args.iter().any(|a| a == "--debug");

    let config = DeribitWsConfig {
        auto_reconnect: reconnect,
        debug_mode,
        ..DeribitWsConfig::with_credentials(is_testnet)?
    };

    tracing::info!(
        "Starting Deribit user orders example ({})",
        if is_testnet { "testnet" } else { "mainnet" }
    );

    if reconnect {
        run_supervised(config).await
    } else {
        run_single(config).await
    }
}

async fn run_single(config: DeribitWsConfig) -> anyhow::Result<()> {
    let client = DeribitUserWebsocket::connect(&config).await?;

    client
        .subscribe_user_orders("any", "any", |order| {
            tracing::info!("{order:?}");
        })
        .await?;

    let consumer = client.clone();
    let mut handle = tokio::spawn(async move { consumer.start_consume_events().await });

    tracing::info!("Listening for order updates... Press Ctrl+C to exit");

    tokio::select! {
        result = &mut handle => {
            result??;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Received SIGINT, closing connection...");
            client.close().await;
            let _ = handle.await;
        }
    }

    tracing::info!("Deribit user orders example finished");
    Ok(())
}

async fn run_supervised(config: DeribitWsConfig) -> anyhow::Result<()> {
    let supervisor = DeribitWsSupervisor::new(config);

    supervisor
        .subscribe_user_orders("any", "any", |order| {
            tracing::info!("{order:?}");
        })
        .await?;

    let runner = supervisor.clone();
    let mut handle = tokio::spawn(async move { runner.run().await });

    tracing::info!("Listening for order updates with reconnection... Press Ctrl+C to exit");

    tokio::select! {
        result = &mut handle => {
            result??;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
            supervisor.shutdown().await;
            handle.await??;
        }
    }

    tracing::info!("Deribit user orders example finished");
    Ok(())
}
