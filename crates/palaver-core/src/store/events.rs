//! Store event types for view notification.
//!
//! The store never returns errors to its callers; everything a view needs
//! to react to (scroll nudges on deltas, failure notices, stream teardown)
//! arrives through this channel.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// User-visible notices emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// The backend answered 429 on stream open.
    RateLimited,
    /// Stream open or transport failed; carries the best available message.
    RequestFailed { message: String },
}

/// Events emitted by the store during streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A content delta was applied to the session. High volume; views use
    /// this to schedule scroll/height updates and may drop extras.
    Delta { session_id: String },

    /// The main chat stream for the session is fully resolved (completed,
    /// cancelled or failed) and the session is back to Idle.
    StreamClosed { session_id: String },

    /// A user-visible notice.
    Notice(Notice),
}

/// Channel-based event sender (async, bounded).
pub type StoreEventTx = mpsc::Sender<StoreEvent>;

/// Channel-based event receiver (async, bounded).
pub type StoreEventRx = mpsc::Receiver<StoreEvent>;

/// Default channel capacity for store event streams.
///
/// Set high enough that best-effort delta sends rarely drop.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded event channel with the default capacity.
pub fn create_event_channel() -> (StoreEventTx, StoreEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender wrapper that provides best-effort and reliable send modes.
///
/// Use `send_delta()` for high-volume events that can be dropped if the
/// consumer is slow. Use `send_important()` for events that must be
/// delivered (notices, stream teardown).
#[derive(Clone)]
pub struct EventSender {
    tx: StoreEventTx,
}

impl EventSender {
    /// Creates a new `EventSender` wrapping the given channel sender.
    pub fn new(tx: StoreEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if channel is full.
    pub fn send_delta(&self, ev: StoreEvent) {
        let _ = self.tx.try_send(ev);
    }

    /// Reliable send: awaits delivery.
    pub async fn send_important(&self, ev: StoreEvent) {
        let _ = self.tx.send(ev).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delta_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);

        let ev = StoreEvent::Delta {
            session_id: "s1".to_string(),
        };
        sender.send_delta(ev.clone());
        sender.send_delta(ev.clone()); // channel full, dropped

        assert_eq!(rx.recv().await, Some(ev));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_important_delivers() {
        let (tx, mut rx) = create_event_channel();
        let sender = EventSender::new(tx);

        sender
            .send_important(StoreEvent::Notice(Notice::RateLimited))
            .await;
        assert_eq!(rx.recv().await, Some(StoreEvent::Notice(Notice::RateLimited)));
    }
}
