//! Kafka publisher and source for the tweet topic.
//!
//! Both clients are built from a [`KafkaConfig`] by the caller and live for the whole run.
//! The consumer commits in the background every `commit_interval`, but only offsets of
//! events the subscriber acknowledged. A crash may redeliver the records of the last
//! interval; the upsert makes that harmless.

use super::{EventSource, Publish, RawEvent};
use crate::config::KafkaConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const MAX_ENQUEUE_RETRIES: usize = 5;

// publisher
// ----------------------------------------------------------------------------

pub struct KafkaPublisher {
    producer: FutureProducer,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|err| {
                Error::Connection(format!("failed to create Kafka producer, error({err})"))
            })?;

        info!("Kafka producer connected to {}", config.bootstrap_servers);
        Ok(Self {
            producer,
            flush_timeout: config.message_timeout,
        })
    }
}

#[async_trait]
impl Publish for KafkaPublisher {
    async fn publish(&self, event: RawEvent) -> Result<()> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(MAX_ENQUEUE_RETRIES)
            .with_jitter()
            .build();

        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(backoff).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }

            let record: FutureRecord<'_, (), [u8]> =
                FutureRecord::to(&event.topic).payload(&event.payload);

            // the delivery future is dropped: the message stays queued and is delivered
            // (or expires after message.timeout.ms) without us waiting on it
            match self.producer.send_result(record) {
                Ok(_delivery) => {
                    trace!("{} bytes queued for {}", event.payload.len(), event.topic);
                    return Ok(());
                }
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_ENQUEUE_RETRIES,
                        "Kafka producer queue full, retrying"
                    );
                }
                Err((err, _)) => {
                    return Err(Error::Connection(format!(
                        "failed to publish to {}, error({err})",
                        event.topic
                    )))
                }
            }
        }

        Err(Error::Connection(format!(
            "Kafka producer queue still full after {MAX_ENQUEUE_RETRIES} retries"
        )))
    }

    async fn close(&self) -> Result<()> {
        debug!("flushing Kafka producer ...");
        self.producer
            .flush(self.flush_timeout)
            .map_err(|err| Error::Connection(format!("failed to flush producer, error({err})")))
    }
}

// source
// ----------------------------------------------------------------------------

pub struct KafkaSource {
    consumer: StreamConsumer,
    linger: Duration,
}

impl KafkaSource {
    /// Joins `config.group_id` and subscribes to `config.topic`.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set(
                "auto.commit.interval.ms",
                config.commit_interval.as_millis().to_string(),
            )
            .set("fetch.max.bytes", config.fetch_max_bytes.to_string())
            .create()
            .map_err(|err| {
                Error::Connection(format!("failed to create Kafka consumer, error({err})"))
            })?;

        consumer.subscribe(&[config.topic.as_str()]).map_err(|err| {
            Error::Connection(format!("failed to subscribe to {}, error({err})", config.topic))
        })?;
        info!(
            "Kafka consumer {} subscribed to {}",
            config.group_id, config.topic
        );

        Ok(Self {
            consumer,
            linger: config.poll_linger,
        })
    }

    /// Next message; a missing payload is handed over as an empty one so its offset is
    /// acknowledged in order. Transient consumption errors are logged and waited out,
    /// librdkafka reconnects by itself.
    async fn recv(&self) -> Result<RawEvent> {
        loop {
            let message = match self.consumer.recv().await {
                Ok(message) => message,
                Err(err) => match consume_error(err) {
                    Error::Unavailable(msg) => {
                        warn!("Kafka consumer error({msg}), waiting for the broker");
                        continue;
                    }
                    err => return Err(err),
                },
            };

            trace!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "message received"
            );
            let payload = message.payload().unwrap_or_default();
            return Ok(RawEvent::new(message.topic(), payload)
                .at(message.partition(), message.offset()));
        }
    }

    fn store(&self, topic: &str, partition: i32, offset: i64) {
        // fails after a rebalance took the partition away; its new owner redelivers
        if let Err(err) = self.consumer.store_offset(topic, partition, offset) {
            warn!("failed to store offset {topic}/{partition}@{offset}, error({err})");
        }
    }
}

/// Consumption errors that librdkafka recovers from become [`Error::Unavailable`].
fn consume_error(err: KafkaError) -> Error {
    match err {
        KafkaError::MessageConsumption(code) if code != RDKafkaErrorCode::Fatal => {
            Error::Unavailable(err.to_string())
        }
        err => Error::Connection(format!("Kafka consumer error({err})")),
    }
}

#[async_trait]
impl EventSource for KafkaSource {
    async fn poll(&mut self, max_records: usize) -> Result<Vec<RawEvent>> {
        // block for the first message, then take what arrives within the linger window
        let mut batch = Vec::with_capacity(max_records);
        batch.push(self.recv().await?);

        let deadline = tokio::time::Instant::now() + self.linger;
        while batch.len() < max_records {
            match tokio::time::timeout_at(deadline, self.recv()).await {
                Ok(Ok(event)) => batch.push(event),
                // hand over what was already consumed; a lasting error surfaces next poll
                Ok(Err(err)) => {
                    warn!("ending poll early, error({err})");
                    break;
                }
                Err(_) => break,
            }
        }

        Ok(batch)
    }

    async fn ack(&mut self, event: &RawEvent) -> Result<()> {
        if let Some(position) = event.position {
            self.store(&event.topic, position.partition, position.offset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_hiccups_are_not_fatal() {
        let transient = [
            RDKafkaErrorCode::BrokerTransportFailure,
            RDKafkaErrorCode::AllBrokersDown,
            RDKafkaErrorCode::UnknownTopicOrPartition,
        ];
        for code in transient {
            let err = consume_error(KafkaError::MessageConsumption(code));
            assert!(matches!(err, Error::Unavailable(_)), "{code:?}");
            assert!(!err.is_fatal());
        }

        let fatal = [
            KafkaError::MessageConsumptionFatal(RDKafkaErrorCode::Fatal),
            KafkaError::MessageConsumption(RDKafkaErrorCode::Fatal),
            KafkaError::Canceled,
        ];
        for err in fatal {
            assert!(consume_error(err).is_fatal());
        }
    }
}
