//! Per-form broadcast channels for the realtime response feed.
//!
//! One `broadcast::Sender` per form, created on demand when the first
//! subscriber or publisher touches it. Fire-and-forget: a send with no
//! subscribers is not an error, and lagged subscribers skip missed
//! events.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::types::ResponseEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Registry of per-form broadcast channels.
#[derive(Default)]
pub struct EventBus {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<ResponseEvent>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get or create the channel for a form.
    async fn channel(&self, form_id: Uuid) -> broadcast::Sender<ResponseEvent> {
        if let Some(tx) = self.channels.read().await.get(&form_id) {
            return tx.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(form_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Broadcast a new-response event. Receiver count is returned for
    /// logging; zero subscribers is normal.
    pub async fn publish(&self, event: ResponseEvent) -> usize {
        let tx = self.channel(event.form_id).await;
        tx.send(event).map(|_| tx.receiver_count()).unwrap_or(0)
    }

    pub async fn subscribe(&self, form_id: Uuid) -> broadcast::Receiver<ResponseEvent> {
        self.channel(form_id).await.subscribe()
    }

    /// Drop channels with no live subscribers. Called alongside the
    /// OTP sweep so deleted forms do not leak senders.
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }
}
