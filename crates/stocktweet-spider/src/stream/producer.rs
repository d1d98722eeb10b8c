use super::{Publish, RawEvent};
use crate::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// A source of raw, already-serialized tweets.
#[async_trait]
pub trait RawFeed: Send {
    /// The next payload; `None` once the feed has ended.
    async fn next(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Replays newline-delimited JSON, one tweet per line; blank lines are skipped.
pub struct NdjsonFeed<R> {
    lines: tokio::io::Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> NdjsonFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> RawFeed for NdjsonFeed<R> {
    async fn next(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.as_bytes().to_vec()));
            }
        }
        Ok(None)
    }
}

/// Publishes every payload of `feed` to `topic` until the feed ends or `token` is
/// cancelled, then closes the publisher. Returns the number of published events.
///
/// The publisher is closed on failure too, before the error is returned.
pub async fn run(
    feed: &mut dyn RawFeed,
    publisher: &dyn Publish,
    topic: &str,
    token: CancellationToken,
) -> Result<u64> {
    info!("producing to {topic}");
    let published = match forward(feed, publisher, topic, token).await {
        Ok(published) => published,
        Err(err) => {
            error!("producer stopped, error({err})");
            if let Err(close_err) = publisher.close().await {
                error!("failed to close publisher, error({close_err})");
            }
            return Err(err);
        }
    };

    publisher.close().await?;
    debug!("{published} events published to {topic}");
    Ok(published)
}

async fn forward(
    feed: &mut dyn RawFeed,
    publisher: &dyn Publish,
    topic: &str,
    token: CancellationToken,
) -> Result<u64> {
    let mut published = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("producer cancelled");
                break;
            }
            next = feed.next() => next?,
        };
        let Some(payload) = next else {
            info!("feed ended");
            break;
        };

        trace!("publishing {} bytes", payload.len());
        publisher.publish(RawEvent::new(topic, payload)).await?;
        published += 1;
    }
    Ok(published)
}
