//! RealtimeHub - Live Connection Manager
//!
//! ## Responsibilities
//!
//! - WebSocket subscriber registration/removal
//! - Fan-out of frame, status, and verdict events to all subscribers
//!
//! A failed delivery to one subscriber never blocks delivery to the others
//! and never propagates out of `broadcast`. Subscribers are removed when
//! the transport reports them gone.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub event types, serialized as `{"type": ..., "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HubEvent {
    /// An annotated frame ready for display (base64 JPEG)
    VideoFrame(String),
    /// Score text or review status line ("VAR CHECKING...", "REVIEW FAILED")
    ScoreUpdate(String),
    /// Structured verdict, forwarded as a JSON string
    Verdict(String),
}

/// Subscriber connection
struct Subscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    subscriber_count: AtomicU64,
}

impl RealtimeHub {
    /// Create a new RealtimeHub
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            subscriber_count: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(id, Subscriber { id, tx });
        }

        self.subscriber_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(subscriber_id = %id, "Viewer connected");

        (id, rx)
    }

    /// Unregister a subscriber
    pub async fn unregister(&self, id: &Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(id).is_some() {
            self.subscriber_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(subscriber_id = %id, "Viewer disconnected");
        }
    }

    /// Broadcast an event to all subscribers.
    ///
    /// Delivery is independent per subscriber; a failure on one is logged
    /// and the rest still receive the event.
    pub async fn broadcast(&self, event: HubEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize hub event");
                return;
            }
        };

        let subscribers = self.subscribers.read().await;
        for sub in subscribers.values() {
            if let Err(e) = sub.tx.send(json.clone()) {
                tracing::warn!(subscriber_id = %sub.id, error = %e, "Failed to send event");
            }
        }
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> u64 {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_string(&HubEvent::VideoFrame("AAAA".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"video_frame","data":"AAAA"}"#);

        let json = serde_json::to_string(&HubEvent::ScoreUpdate("12 | 7".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"score_update","data":"12 | 7"}"#);

        let json = serde_json::to_string(&HubEvent::Verdict("{}".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"verdict","data":"{}"}"#);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let hub = RealtimeHub::new();
        let (_id_a, mut rx_a) = hub.register().await;
        let (_id_b, mut rx_b) = hub.register().await;

        hub.broadcast(HubEvent::ScoreUpdate("VAR CHECKING...".to_string()))
            .await;

        assert!(rx_a.recv().await.unwrap().contains("VAR CHECKING"));
        assert!(rx_b.recv().await.unwrap().contains("VAR CHECKING"));
    }

    #[tokio::test]
    async fn test_broadcast_survives_a_dead_subscriber() {
        let hub = RealtimeHub::new();
        let (_id_a, rx_a) = hub.register().await;
        let (_id_b, mut rx_b) = hub.register().await;
        let (_id_c, mut rx_c) = hub.register().await;

        // Subscriber A's receiving side is gone; its send fails
        drop(rx_a);

        hub.broadcast(HubEvent::Verdict("{\"verdict\":\"FOUL\"}".to_string()))
            .await;

        assert!(rx_b.recv().await.unwrap().contains("FOUL"));
        assert!(rx_c.recv().await.unwrap().contains("FOUL"));
    }

    #[tokio::test]
    async fn test_register_unregister_tracks_count() {
        let hub = RealtimeHub::new();
        let (id, _rx) = hub.register().await;
        assert_eq!(hub.subscriber_count(), 1);
        hub.unregister(&id).await;
        assert_eq!(hub.subscriber_count(), 0);
        // Unregistering twice is harmless
        hub.unregister(&id).await;
        assert_eq!(hub.subscriber_count(), 0);
    }
}
