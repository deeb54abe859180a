// SPDX-License-Identifier: Apache-2.0
//! Outstanding request table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use portway_proto::{ReplyEnvelope, RequestId};
use serde_json::Value;
use tokio::sync::oneshot;

/// Maps request ids to the tasks waiting on them.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    next: AtomicU64,
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<Value>>>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Value>>> {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate a fresh id and the receiver its reply will land on.
    pub(crate) fn register(&self) -> (RequestId, oneshot::Receiver<Value>) {
        let id = RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id.clone(), tx);
        (id, rx)
    }

    /// Forget a request whose envelope never left.
    pub(crate) fn cancel(&self, id: &RequestId) {
        self.lock().remove(id);
    }

    /// Hand `reply` to its waiter. Returns `false` for unknown or abandoned ids.
    pub(crate) fn resolve(&self, reply: ReplyEnvelope) -> bool {
        match self.lock().remove(&reply.request_id) {
            Some(tx) => tx.send(reply.msg).is_ok(),
            None => false,
        }
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
