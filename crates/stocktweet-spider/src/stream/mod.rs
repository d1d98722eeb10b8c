//! Streaming ingestion: raw tweets are published to a topic by the producer, and the
//! subscriber turns them into `tweet_stream` rows.
//!
//! ```text
//! RawFeed --> producer::run --> Publish --> topic --> EventSource --> Subscriber --> Upsert
//! ```

mod channel;
pub mod kafka;
pub mod producer;
pub mod subscriber;

pub use channel::{channel, ChannelPublisher, ChannelSource};
pub use kafka::{KafkaPublisher, KafkaSource};
pub use subscriber::{Subscriber, SubscriberStats};

use crate::Result;
use async_trait::async_trait;

/// A serialized event and the topic it travels on; the payload is opaque here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Where the event sits in a partitioned log, when it came from one.
    pub position: Option<Position>,
}

/// Partition and offset of a consumed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub partition: i32,
    pub offset: i64,
}

impl RawEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            position: None,
        }
    }

    pub fn at(mut self, partition: i32, offset: i64) -> Self {
        self.position = Some(Position { partition, offset });
        self
    }
}

/// Appends events to a topic. Fire-and-forget: returning `Ok` means the event was handed to
/// the broker client, not that a subscriber will see it.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, event: RawEvent) -> Result<()>;

    /// Hands over anything still buffered; called once before shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Pulls batches of events.
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next events, returning at most `max_records` of them. An empty batch
    /// means the source is exhausted.
    async fn poll(&mut self, max_records: usize) -> Result<Vec<RawEvent>>;

    /// Marks `event` as done. Only acknowledged events count as consumed when the source
    /// commits, so anything polled but never acknowledged is delivered again.
    async fn ack(&mut self, _event: &RawEvent) -> Result<()> {
        Ok(())
    }
}
