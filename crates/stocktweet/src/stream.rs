use std::path::PathBuf;
use stocktweet_spider::config::{self, CredentialProvider, DbTargets, KafkaConfig};
use stocktweet_spider::db::PgStore;
use stocktweet_spider::sentiment::LexiconClassifier;
use stocktweet_spider::stream::producer::{self, NdjsonFeed, RawFeed};
use stocktweet_spider::stream::{KafkaPublisher, KafkaSource, Subscriber};
use stocktweet_spider::twitter::{TwitterClient, TwitterFeed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Twitter (or a replay file) -> tweet topic.
pub(crate) async fn produce(
    secrets: &dyn CredentialProvider,
    track: Vec<String>,
    file: Option<PathBuf>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let kafka = KafkaConfig::from_env()?;
    debug!("{kafka:?}");

    let mut feed: Box<dyn RawFeed> = match file {
        Some(path) => {
            info!("replaying tweets from {path:?}");
            let file = tokio::fs::File::open(&path).await?;
            Box::new(NdjsonFeed::new(tokio::io::BufReader::new(file)))
        }
        None => {
            let keys = config::twitter_creds(secrets).await?;
            Box::new(TwitterFeed::new(TwitterClient::new(keys)?, track))
        }
    };

    let publisher = KafkaPublisher::new(&kafka)?;
    let published = producer::run(feed.as_mut(), &publisher, &kafka.topic, token).await?;
    info!("{published} tweets published to {}", kafka.topic);
    Ok(())
}

/// Tweet topic -> `tweet_stream`.
pub(crate) async fn consume(token: CancellationToken) -> anyhow::Result<()> {
    let kafka = KafkaConfig::from_env()?;
    let targets = DbTargets::from_env()?;
    debug!("{kafka:?}");

    let source = KafkaSource::new(&kafka)?;
    let store = PgStore::new(&targets.stream_creds());
    let mut subscriber = Subscriber::new(source, store, LexiconClassifier)
        .with_max_poll_records(kafka.max_poll_records);

    let stats = subscriber.run(token).await?;
    info!(
        "{} tweets consumed: {} upserted, {} retweets dropped, {} failed",
        stats.polled, stats.upserted, stats.dropped, stats.failed
    );
    Ok(())
}
