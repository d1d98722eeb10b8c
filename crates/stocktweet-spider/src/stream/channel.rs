use super::{EventSource, Publish, RawEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// In-process topic: a bounded tokio channel standing in for the broker.
pub fn channel(capacity: usize) -> (ChannelPublisher, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelPublisher { tx }, ChannelSource { rx })
}

#[derive(Clone, Debug)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<RawEvent>,
}

#[async_trait]
impl Publish for ChannelPublisher {
    async fn publish(&self, event: RawEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Connection("channel source dropped".to_string()))
    }
}

#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<RawEvent>,
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn poll(&mut self, max_records: usize) -> Result<Vec<RawEvent>> {
        let Some(first) = self.rx.recv().await else {
            return Ok(Vec::new());
        };

        let mut batch = vec![first];
        while batch.len() < max_records {
            match self.rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}
