use super::{EventSource, RawEvent};
use crate::db::{Upsert, UpsertRequest};
use crate::record::Record;
use crate::sentiment::Classify;
use crate::tweet::{Tweet, STREAM_TABLE, TWEET_KEY};
use crate::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Where the consume loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Polling,
    Transforming,
    Dispatching,
    Stopped,
}

/// What happened to one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Filtered out (retweet); nothing was written.
    Dropped,
    /// Merged; `0` when the tweet was already stored.
    Upserted(u64),
}

/// Counters of a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    pub polled: u64,
    pub dropped: u64,
    pub failed: u64,
    pub upserted: u64,
}

/// Consumes raw tweets, keeps the original ones, classifies them, and merges each into
/// `tweet_stream` keyed on `twitter_id`.
pub struct Subscriber<S, U> {
    source: S,
    store: U,
    classifier: Box<dyn Classify>,
    max_poll_records: usize,
    state: State,
}

impl<S: EventSource, U: Upsert> Subscriber<S, U> {
    pub fn new(source: S, store: U, classifier: impl Classify + 'static) -> Self {
        Self {
            source,
            store,
            classifier: Box::new(classifier),
            max_poll_records: 100,
            state: State::Idle,
        }
    }

    pub fn with_max_poll_records(mut self, max_poll_records: usize) -> Self {
        self.max_poll_records = max_poll_records.max(1);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Decodes and filters one event; `None` for retweets.
    pub fn transform(&self, event: &RawEvent) -> Result<Option<Record>> {
        let tweet = Tweet::decode(&event.payload)?;
        if tweet.is_retweet() {
            trace!("dropping retweet {}", tweet.id);
            return Ok(None);
        }
        tweet.stream_record(self.classifier.as_ref()).map(Some)
    }

    /// Transforms one event and dispatches its record.
    pub async fn handle(&mut self, event: &RawEvent) -> Result<Outcome> {
        self.state = State::Transforming;
        let Some(record) = self.transform(event)? else {
            return Ok(Outcome::Dropped);
        };
        debug!("consumed {record}");

        self.state = State::Dispatching;
        let request = UpsertRequest::new(STREAM_TABLE, [TWEET_KEY], vec![record])?;
        let inserted = self.store.upsert(request).await?;
        Ok(Outcome::Upserted(inserted))
    }

    /// Polls until `token` is cancelled or the source is exhausted.
    ///
    /// Malformed events and records the table rejects are logged and skipped; connection
    /// and credential failures end the run with an error. An event is acknowledged to the
    /// source once it is stored or skipped, never before; events still in flight when the
    /// run ends are left for redelivery.
    pub async fn run(&mut self, token: CancellationToken) -> Result<SubscriberStats> {
        let mut stats = SubscriberStats::default();
        info!("subscriber started");

        loop {
            if token.is_cancelled() {
                info!("subscriber cancelled");
                break;
            }

            self.state = State::Polling;
            let max_records = self.max_poll_records;
            let batch = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("subscriber cancelled while polling");
                    break;
                }
                batch = self.source.poll(max_records) => batch,
            };
            let batch = match batch {
                Ok(batch) => batch,
                Err(err) if !err.is_fatal() => {
                    warn!("poll failed, retrying, error({err})");
                    continue;
                }
                Err(err) => {
                    error!("failed to poll events, error({err})");
                    self.state = State::Stopped;
                    return Err(err);
                }
            };
            if batch.is_empty() {
                info!("event source exhausted");
                break;
            }

            trace!("polled {} events", batch.len());
            for event in &batch {
                stats.polled += 1;
                match self.handle(event).await {
                    Ok(Outcome::Dropped) => stats.dropped += 1,
                    Ok(Outcome::Upserted(n)) => stats.upserted += n,
                    Err(err) if !err.is_fatal() => {
                        error!("skipping event from {}, error({err})", event.topic);
                        stats.failed += 1;
                    }
                    Err(err) => {
                        error!("subscriber stopped, error({err})");
                        self.state = State::Stopped;
                        return Err(err);
                    }
                }
                self.source.ack(event).await?;
            }
        }

        self.state = State::Stopped;
        info!(
            polled = stats.polled,
            dropped = stats.dropped,
            failed = stats.failed,
            upserted = stats.upserted,
            "subscriber finished"
        );
        Ok(stats)
    }
}
