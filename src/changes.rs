//! In-process change feed.
//!
//! Every committed mutation publishes a `ChangeEvent`. WebSocket clients
//! subscribe and re-fetch whatever collection changed; lagging receivers
//! skip ahead rather than block publishers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::enums::{ChangeAction, Collection};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub action: ChangeAction,
    pub document_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish one change. Having no subscribers is not an error.
    pub fn publish(&self, collection: Collection, action: ChangeAction, document_id: Uuid) {
        let event = ChangeEvent {
            collection,
            action,
            document_id,
            timestamp: Utc::now(),
        };
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::debug!(%collection, %action, %document_id, receivers, "Change published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
