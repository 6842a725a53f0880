use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::StoreEvent;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every store event.
    All,
    /// Events touching one room type.
    RoomType(String),
}

/// Broadcast hub for store change events, per room type and overall.
pub struct NotifyHub {
    channels: DashMap<Topic, broadcast::Sender<StoreEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a topic. Creates the channel if needed.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<StoreEvent> {
        let sender = self
            .channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish to `All` and to the event's room type. No-op if nobody is listening.
    pub fn send(&self, event: &StoreEvent) {
        if let Some(sender) = self.channels.get(&Topic::All) {
            let _ = sender.send(event.clone());
        }
        if let Some(room_type) = event.room_type()
            && let Some(sender) = self.channels.get(&Topic::RoomType(room_type.to_string()))
        {
            let _ = sender.send(event.clone());
        }
    }
}
