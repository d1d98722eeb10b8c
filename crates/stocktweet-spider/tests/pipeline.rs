use std::sync::Arc;
use stocktweet_spider::db::MemoryStore;
use stocktweet_spider::record::Value;
use stocktweet_spider::sentiment::LexiconClassifier;
use stocktweet_spider::stream::producer::{self, NdjsonFeed};
use stocktweet_spider::stream::{channel, Subscriber, SubscriberStats};
use tokio_util::sync::CancellationToken;

// Raw statuses as the filtered stream delivers them, one per line.
const STATUSES: &str = r#"
{"id": 42, "text": "RT @miner: uranium is great", "retweeted": false, "user": {"screen_name": "bot", "verified": false, "followers_count": 3}}
{"id": 43, "text": "uranium prices are rising", "truncated": false, "retweeted": false, "created_at": "Thu Jun 02 09:15:00 +0000 2022", "user": {"screen_name": "jane", "verified": true, "followers_count": 1200}}
{"id": 44, "text": "uranium stocks look terrible today", "user": {"screen_name": "joe", "verified": false, "followers_count": 10}}
{"id": 43, "text": "uranium prices are rising", "user": {"screen_name": "jane", "verified": true, "followers_count": 1200}}
not even json
"#;

#[tokio::test]
async fn produce_then_consume() {
    let (publisher, source) = channel(16);
    let store = Arc::new(MemoryStore::new());
    let token = CancellationToken::new();

    // -- PRODUCE --
    let producer = tokio::spawn({
        let token = token.clone();
        async move {
            let mut feed = NdjsonFeed::new(STATUSES.as_bytes());
            producer::run(&mut feed, &publisher, "TWEET_STREAM", token).await
        }
    });

    // -- CONSUME --
    let mut subscriber = Subscriber::new(source, store.clone(), LexiconClassifier);
    let stats = subscriber.run(token).await.unwrap();
    assert_eq!(producer.await.unwrap().unwrap(), 5);

    assert_eq!(
        stats,
        SubscriberStats {
            polled: 5,
            dropped: 1,
            failed: 1,
            upserted: 2,
        }
    );

    // -- VERIFY --
    let rows = store.rows("tweet_stream").await;
    assert_eq!(rows.len(), 2);

    let jane = &rows[0];
    assert_eq!(jane.get("twitter_id"), Some(&Value::Int(43)));
    assert_eq!(jane.get("username"), Some(&Value::from("jane")));
    assert_eq!(jane.get("verified_user"), Some(&Value::Bool(true)));
    assert_eq!(jane.get("followers"), Some(&Value::Int(1200)));
    assert_eq!(jane.get("sentiment"), Some(&Value::from("positive")));
    assert!(matches!(jane.get("created_at"), Some(Value::Timestamp(_))));

    let joe = &rows[1];
    assert_eq!(joe.get("twitter_id"), Some(&Value::Int(44)));
    assert_eq!(joe.get("created_at"), Some(&Value::Null));
    assert_eq!(joe.get("sentiment"), Some(&Value::from("negative")));
}
