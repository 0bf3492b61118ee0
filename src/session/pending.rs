// This file is part of the sftpio project
//
// Copyright (C) The sftpio authors, 2025. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::message::Message;
use crate::Error;

/// Request state shared between session handles and the I/O task.
///
/// Every issued request id stays in the table until exactly one response
/// carrying that id arrives or the session tears down. A waiter that gives
/// up (timeout, cancellation) leaves its entry registered; the late
/// response is dispatched into the abandoned slot and dropped, which keeps
/// id bookkeeping consistent.
pub(crate) struct Pending {
    table: Mutex<HashMap<u32, oneshot::Sender<Result<Message, Error>>>>,
    next_id: AtomicU64,
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u32, oneshot::Sender<Result<Message, Error>>>> {
        // The table holds no invariant a panicking writer could break.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ids only have to be unique among live requests, which are bounded,
    /// so truncating the monotonic counter to 32 bits is safe across wrap.
    pub(crate) fn next_request_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) as u32
    }

    pub(crate) fn register(&self, id: u32) -> oneshot::Receiver<Result<Message, Error>> {
        let (tx, rx) = oneshot::channel();
        self.table().insert(id, tx);
        rx
    }

    pub(crate) fn discard(&self, id: u32) {
        self.table().remove(&id);
    }

    /// Route a response to its waiter. The completion fires outside the
    /// lock. Returns false when the id matches no pending request.
    pub(crate) fn complete(&self, id: u32, result: Result<Message, Error>) -> bool {
        let Some(sender) = self.table().remove(&id) else {
            return false;
        };
        let _ = sender.send(result);
        true
    }

    /// Wake every outstanding waiter with `error` and empty the table.
    pub(crate) fn fail_all(&self, error: &Error) {
        let drained: Vec<_> = self.table().drain().collect();
        for (_, sender) in drained {
            let _ = sender.send(Err(error.clone()));
        }
    }
}

/// The receiving half of one issued request.
pub(crate) struct ResponseSlot {
    rx: oneshot::Receiver<Result<Message, Error>>,
    timeout: Duration,
}

impl ResponseSlot {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Message, Error>>, timeout: Duration) -> Self {
        Self { rx, timeout }
    }

    /// Wait for the response, bounded by the per-operation timeout. A
    /// timeout aborts only this wait; the session stays usable.
    pub(crate) async fn recv(self) -> Result<Message, Error> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::Timeout),
        }
    }
}
