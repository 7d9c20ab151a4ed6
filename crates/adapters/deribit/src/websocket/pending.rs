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

//! Correlation of in-flight JSON-RPC calls with their responses.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use super::error::{DeribitWsError, DeribitWsResult};

type PendingSender = oneshot::Sender<DeribitWsResult<Value>>;

/// Table of calls awaiting a response, keyed by request ID.
#[derive(Debug, Default)]
pub struct PendingCalls {
    slots: DashMap<u64, PendingSender>,
}

impl PendingCalls {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot for `id` and returns the receiving end.
    ///
    /// A slot already registered under `id` is replaced and its caller sees a closed channel.
    pub fn register(&self, id: u64) -> oneshot::Receiver<DeribitWsResult<Value>> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        rx
    }

    /// Resolves the slot for `id`.
    ///
    /// Returns `false` if nothing was waiting on `id`, so the caller can apply its
    /// own handling to the response.
    pub fn complete(&self, id: u64, result: DeribitWsResult<Value>) -> bool {
        match self.slots.remove(&id) {
            Some((_, tx)) => {
                if tx.send(result).is_err() {
                    tracing::debug!("Caller for request {id} no longer waiting");
                }
                true
            }
            None => false,
        }
    }

    /// Returns whether a caller is waiting on `id`.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    /// Drops the slot for `id` without resolving it.
    pub fn cancel(&self, id: u64) {
        self.slots.remove(&id);
    }

    /// Fails every outstanding slot with `error`.
    pub fn fail_all(&self, error: &DeribitWsError) {
        let ids: Vec<u64> = self.slots.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.slots.remove(&id) {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    /// Returns the number of outstanding calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether no calls are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
