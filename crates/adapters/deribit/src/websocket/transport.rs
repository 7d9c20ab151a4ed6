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

//! Text-frame WebSocket transport with an inbound size ceiling.
//!
//! The stream is split so that one task can block in [`DeribitWsTransport::read_text`] while
//! other tasks write. Writes are serialized by the sink mutex, so each frame goes out whole.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{Message, protocol::WebSocketConfig},
};
use tokio_util::sync::CancellationToken;

use super::error::{DeribitWsError, DeribitWsResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw duplex text-frame channel to the Deribit endpoint.
pub struct DeribitWsTransport {
    url: String,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
    cancel_token: CancellationToken,
    closed: AtomicBool,
}

impl std::fmt::Debug for DeribitWsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitWsTransport))
            .field("url", &self.url)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl DeribitWsTransport {
    /// Dials `url` and configures the inbound message ceiling.
    ///
    /// A frame of exactly `max_message_size` bytes is accepted; anything larger fails
    /// the read that receives it. Cancelling `cancel_token` unblocks a pending read.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::Connect`] if the dial fails or exceeds `timeout`.
    pub async fn connect(
        url: &str,
        timeout: Duration,
        max_message_size: usize,
        cancel_token: CancellationToken,
    ) -> DeribitWsResult<Self> {
        let config = WebSocketConfig::default().max_message_size(Some(max_message_size));

        let (stream, _response) =
            tokio::time::timeout(timeout, connect_async_with_config(url, Some(config), false))
                .await
                .map_err(|_| {
                    DeribitWsError::Connect(format!("Timed out after {timeout:?} dialing {url}"))
                })?
                .map_err(|e| DeribitWsError::Connect(e.to_string()))?;

        tracing::debug!("WebSocket stream established: {url}");

        let (writer, reader) = stream.split();

        Ok(Self {
            url: url.to_string(),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            cancel_token,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends one complete text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::NotConnected`] after close, or [`DeribitWsError::Send`]
    /// if the write fails.
    pub async fn write_text(&self, text: String) -> DeribitWsResult<()> {
        if self.is_closed() {
            return Err(DeribitWsError::NotConnected);
        }

        let mut writer = self.writer.lock().await;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| DeribitWsError::Send(e.to_string()))
    }

    /// Waits for the next complete inbound text frame.
    ///
    /// Control frames are skipped. Binary frames are accepted when they hold UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::Closed`] when the transport is closed locally, and
    /// [`DeribitWsError::Read`] on I/O failure, oversized frames or a remote close.
    pub async fn read_text(&self) -> DeribitWsResult<String> {
        let mut reader = self.reader.lock().await;

        loop {
            let next = tokio::select! {
                () = self.cancel_token.cancelled() => return Err(DeribitWsError::Closed),
                next = reader.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map_err(|e| DeribitWsError::Read(format!("Non UTF-8 binary frame: {e}")));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "no close frame".to_string(),
                        |f| format!("{} {}", f.code, f.reason),
                    );
                    return Err(DeribitWsError::Read(format!(
                        "Connection closed by remote: {reason}"
                    )));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => return Err(DeribitWsError::Read(e.to_string())),
                None => return Err(DeribitWsError::Read("Stream ended".to_string())),
            }
        }
    }

    /// Closes the transport. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel_token.cancel();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Close(None)).await {
            tracing::debug!("Close frame not sent: {e}");
        }
        if let Err(e) = writer.close().await {
            tracing::debug!("Writer not closed cleanly: {e}");
        }
    }
}
