//! Twitter payloads to table rows.
//!
//! Raw payloads are the v1.1 status JSON (as pushed by the filtered stream and returned by
//! search); only the fields the tables need are deserialized.

use crate::record::{Record, Value};
use crate::sentiment::Classify;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Table the stream consumer writes to, and its natural key.
pub const STREAM_TABLE: &str = "tweet_stream";
/// Table the backfill job writes to.
pub const BATCH_TABLE: &str = "tweet";
pub const TWEET_KEY: &str = "twitter_id";

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

// de
// ----------------------------------------------------------------------------
//
// {
//     "created_at": "Wed Jun 01 17:02:11 +0000 2022",
//     "id": 1532054431069224961,
//     "text": "Uranium prices are rising ...",
//     "truncated": true,
//     "extended_tweet": { "full_text": "Uranium prices are rising fast ..." },
//     "retweeted": false,
//     "user": { "name": "Jane", "screen_name": "jane", "verified": false, "followers_count": 310 },
//     ...
// }

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Tweet {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub retweeted: bool,
    pub extended_tweet: Option<ExtendedTweet>,
    pub created_at: Option<String>,
    pub user: Option<User>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExtendedTweet {
    pub full_text: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct User {
    pub name: Option<String>,
    pub screen_name: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub followers_count: Option<i64>,
}

impl Tweet {
    /// Decodes a raw payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|err| Error::Transform(format!("undecodable tweet payload, error({err})")))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| Error::Transform(format!("undecodable tweet, error({err})")))
    }

    /// Retweets repeat content already collected.
    pub fn is_retweet(&self) -> bool {
        self.retweeted || self.text.contains("RT @")
    }

    /// The untruncated text when the payload carries it.
    pub fn full_text(&self) -> &str {
        match (&self.extended_tweet, self.truncated) {
            (Some(extended), true) => &extended.full_text,
            _ => &self.text,
        }
    }

    pub fn created_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.created_at
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|err| {
                        Error::Transform(format!(
                            "tweet {} has an invalid created_at {raw:?}, error({err})",
                            self.id
                        ))
                    })
            })
            .transpose()
    }

    /// Row of `tweet_stream`.
    pub fn stream_record(&self, classifier: &dyn Classify) -> Result<Record> {
        let text = self.full_text();
        let user = self.user.as_ref();
        Ok(Record::new()
            .with(TWEET_KEY, self.id)
            .with("username", user.and_then(|u| u.screen_name.clone()))
            .with("text", text)
            .with("created_at", self.created_at()?)
            .with("verified_user", user.map(|u| u.verified))
            .with("followers", user.and_then(|u| u.followers_count))
            .with("sentiment", classifier.classify(text).as_str()))
    }

    /// Row of `tweet`.
    pub fn batch_record(&self, classifier: &dyn Classify) -> Result<Record> {
        let text = self.full_text();
        Ok(Record::new()
            .with(TWEET_KEY, self.id)
            .with(
                "username",
                self.user.as_ref().and_then(|u| u.name.clone()).map(Value::Text),
            )
            .with("text", text)
            .with("created_at", self.created_at()?)
            .with("sentiment", classifier.classify(text).as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::LexiconClassifier;

    const RAW: &str = r#"{
        "created_at": "Wed Jun 01 17:02:11 +0000 2022",
        "id": 1532054431069224961,
        "text": "Uranium is rising… https://t.co/x",
        "truncated": true,
        "extended_tweet": { "full_text": "Uranium is rising, great week for miners" },
        "retweeted": false,
        "user": { "name": "Jane", "screen_name": "jane", "verified": true, "followers_count": 310 }
    }"#;

    #[test]
    fn stream_record_prefers_full_text() {
        let tweet = Tweet::decode(RAW.as_bytes()).unwrap();
        let record = tweet.stream_record(&LexiconClassifier).unwrap();

        assert_eq!(
            record.columns(),
            [
                "twitter_id",
                "username",
                "text",
                "created_at",
                "verified_user",
                "followers",
                "sentiment"
            ]
        );
        assert_eq!(record.get("twitter_id"), Some(&Value::Int(1532054431069224961)));
        assert_eq!(
            record.get("text"),
            Some(&Value::from("Uranium is rising, great week for miners"))
        );
        assert_eq!(record.get("username"), Some(&Value::from("jane")));
        assert_eq!(record.get("verified_user"), Some(&Value::Bool(true)));
        assert_eq!(record.get("followers"), Some(&Value::Int(310)));
        assert_eq!(record.get("sentiment"), Some(&Value::from("positive")));
        assert_eq!(
            record.get("created_at"),
            Some(&Value::Timestamp(
                DateTime::parse_from_rfc3339("2022-06-01T17:02:11Z")
                    .unwrap()
                    .with_timezone(&Utc)
            ))
        );
    }

    #[test]
    fn minimal_payload_has_null_user_fields() {
        let tweet = Tweet::decode(
            br#"{"id": 43, "text": "uranium prices are rising", "truncated": false, "retweeted": false}"#,
        )
        .unwrap();
        let record = tweet.stream_record(&LexiconClassifier).unwrap();

        assert_eq!(record.get("username"), Some(&Value::Null));
        assert_eq!(record.get("created_at"), Some(&Value::Null));
        assert_eq!(record.get("followers"), Some(&Value::Null));
    }

    #[test]
    fn truncated_without_extension_keeps_text() {
        let tweet = Tweet::decode(br#"{"id": 1, "text": "short", "truncated": true}"#).unwrap();
        assert_eq!(tweet.full_text(), "short");
    }

    #[test]
    fn retweets() {
        let flagged = Tweet::decode(br#"{"id": 42, "text": "great", "retweeted": true}"#).unwrap();
        let quoted = Tweet::decode(br#"{"id": 44, "text": "RT @x great"}"#).unwrap();
        let plain = Tweet::decode(br#"{"id": 45, "text": "great"}"#).unwrap();

        assert!(flagged.is_retweet());
        assert!(quoted.is_retweet());
        assert!(!plain.is_retweet());
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(Tweet::decode(b"{"), Err(Error::Transform(_))));
        assert!(matches!(
            Tweet::decode(br#"{"text": "no id"}"#),
            Err(Error::Transform(_))
        ));

        let bad_date =
            Tweet::decode(br#"{"id": 1, "text": "x", "created_at": "yesterday"}"#).unwrap();
        assert!(matches!(
            bad_date.stream_record(&LexiconClassifier),
            Err(Error::Transform(_))
        ));
    }

    #[test]
    fn batch_record_columns() {
        let tweet = Tweet::decode(RAW.as_bytes()).unwrap();
        let record = tweet.batch_record(&LexiconClassifier).unwrap();
        assert_eq!(
            record.columns(),
            ["twitter_id", "username", "text", "created_at", "sentiment"]
        );
        assert_eq!(record.get("username"), Some(&Value::from("Jane")));
    }
}
