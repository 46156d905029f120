//! # Event Bus
//!
//! Per-execution publish/subscribe hub. Subscribers register a channel for one
//! execution id and receive that execution's lifecycle events in publish
//! order. The engine is the sole publisher per id, so per-id ordering follows
//! the state machine; nothing is guaranteed across different ids.
//!
//! Joining late is safe: if the execution already reached a terminal record,
//! a single synthesized `completed` event carrying that record is delivered at
//! subscribe time, so no subscriber ever misses a finished execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::executor::{ExecutionId, ExecutionRecord, ExecutionStatus, ExecutionStore};

/// One lifecycle event for one execution.
///
/// Wire shape: `{status, error?, result?}`. Terminal events carry the full
/// record in `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionRecord>,
}

impl ExecutionEvent {
    /// A bare transition event.
    pub fn status(status: ExecutionStatus) -> Self {
        Self {
            status,
            error: None,
            result: None,
        }
    }

    /// The event for a record that reached a terminal state.
    pub fn terminal(record: &ExecutionRecord) -> Self {
        Self {
            status: record.status,
            error: (!record.error.is_empty()).then(|| record.error.clone()),
            result: Some(record.clone()),
        }
    }

    /// The synthesized replay-on-join event for an already finished execution.
    pub fn replay(record: &ExecutionRecord) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            error: None,
            result: Some(record.clone()),
        }
    }
}

pub type SubscriptionId = u64;

/// Receiving half of one subscription.
pub struct EventSubscription {
    pub execution_id: ExecutionId,
    pub id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<ExecutionEvent>,
}

impl EventSubscription {
    /// Waits for the next event. Returns `None` once the subscription has
    /// been removed from the bus and all buffered events were drained.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        self.receiver.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<ExecutionEvent> {
        UnboundedReceiverStream::new(self.receiver)
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<ExecutionEvent>,
}

/// Publish/subscribe hub, keyed by execution id.
pub struct EventBus {
    subscribers: DashMap<ExecutionId, Vec<Subscriber>>,
    store: Arc<ExecutionStore>,
    next_subscription: AtomicU64,
}

impl EventBus {
    pub fn new(store: Arc<ExecutionStore>) -> Self {
        Self {
            subscribers: DashMap::new(),
            store,
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Registers a channel for `execution_id` and returns its receiving half.
    /// Already-finished executions are replayed immediately.
    pub fn subscribe(&self, execution_id: &str) -> EventSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(execution_id.to_string())
            .or_default()
            .push(Subscriber {
                id,
                sender: sender.clone(),
            });
        if let Some(record) = self.store.get(execution_id) {
            if record.is_terminal() {
                debug!(execution_id, "replaying finished execution to new subscriber");
                let _ = sender.send(ExecutionEvent::replay(&record));
            }
        }
        EventSubscription {
            execution_id: execution_id.to_string(),
            id,
            receiver,
        }
    }

    /// Delivers `event` to every channel registered for `execution_id`, in
    /// registration order. A channel whose receiver is gone is removed without
    /// interrupting delivery to the rest; publishing never blocks.
    pub fn publish(&self, execution_id: &str, event: ExecutionEvent) {
        let Some(mut subscribers) = self.subscribers.get_mut(execution_id) else {
            return;
        };
        subscribers.retain(|subscriber| subscriber.sender.send(event.clone()).is_ok());
        let emptied = subscribers.is_empty();
        drop(subscribers);
        if emptied {
            self.subscribers
                .remove_if(execution_id, |_, subscribers| subscribers.is_empty());
        }
    }

    /// Removes one channel; an emptied subscriber set is dropped. The
    /// execution record itself is unaffected.
    pub fn unsubscribe(&self, execution_id: &str, subscription: SubscriptionId) {
        if let Some(mut subscribers) = self.subscribers.get_mut(execution_id) {
            subscribers.retain(|subscriber| subscriber.id != subscription);
            let emptied = subscribers.is_empty();
            drop(subscribers);
            if emptied {
                self.subscribers
                    .remove_if(execution_id, |_, subscribers| subscribers.is_empty());
            }
        }
    }

    pub fn subscriber_count(&self, execution_id: &str) -> usize {
        self.subscribers
            .get(execution_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}
