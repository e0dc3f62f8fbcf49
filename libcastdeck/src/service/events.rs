//! Lifecycle events
//!
//! An in-process bus built on `tokio::sync::broadcast`. Services and the
//! dispatcher emit events as posts move through their lifecycle; the API
//! streams them to websocket clients.
//!
//! Emission never blocks. With no subscribers the event is dropped, and a
//! lagging subscriber loses its oldest events rather than slowing emitters.
//!
//! ```
//! use libcastdeck::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::PostCancelled { post_id: "abc".to_string() });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer before old events are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PostScheduled {
        post_id: String,
        account_id: String,
        scheduled_at: DateTime<Utc>,
    },

    PostCancelled {
        post_id: String,
    },

    PostPublished {
        post_id: String,
        account_id: String,
        platform: String,
        platform_post_id: String,
    },

    /// A publish attempt failed; `will_retry` is false once the post is
    /// terminally `failed`
    PostFailed {
        post_id: String,
        account_id: String,
        platform: String,
        error: String,
        attempts: u32,
        will_retry: bool,
    },

    MetricsUpdated {
        post_id: String,
        likes: i64,
        comments: i64,
        shares: i64,
        sentiment: f64,
    },
}

impl Event {
    /// Id of the post the event is about
    pub fn post_id(&self) -> &str {
        match self {
            Event::PostScheduled { post_id, .. }
            | Event::PostCancelled { post_id }
            | Event::PostPublished { post_id, .. }
            | Event::PostFailed { post_id, .. }
            | Event::MetricsUpdated { post_id, .. } => post_id,
        }
    }
}
