use super::{connection, query_failed, DAILY_SENTIMENT};
use crate::Pools;
use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 5;
const MAX_LIMIT: i64 = 100;

/// Number of streamed tweets.
#[derive(Deserialize, Serialize, utoipa::ToSchema)]
struct StreamCount {
    count: i64,
}

#[utoipa::path(
    get,
    path = "/stream/count",
    responses(
        (
            status = 200,
            description = "Number of tweets consumed from the stream",
            body = StreamCount,
            content_type = "application/json",
            example = json!({"count": 1532})
        )
    )
)]
#[get("/stream/count")]
pub(crate) async fn stream_count(pools: web::Data<Pools>) -> impl Responder {
    let conn = match connection(&pools.stream).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match conn.query_one("SELECT COUNT(id) FROM tweet_stream", &[]).await {
        Ok(row) => HttpResponse::Ok().json(StreamCount { count: row.get(0) }),
        Err(e) => query_failed(e),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct LatestQuery {
    /// Number of tweets, 5 by default and at most 100.
    limit: Option<i64>,
}

impl LatestQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Streamed tweet.
#[derive(Deserialize, Serialize, utoipa::ToSchema)]
struct StreamedTweet {
    twitter_id: i64,
    username: Option<String>,
    text: Option<String>,
    created_at: Option<chrono::NaiveDateTime>,
    verified_user: Option<bool>,
    followers: Option<i32>,
    sentiment: Option<String>,
}

#[utoipa::path(
    get,
    path = "/stream/latest",
    params(LatestQuery),
    responses(
        (
            status = 200,
            description = "The most recent streamed tweets, newest first",
            body = [StreamedTweet],
            content_type = "application/json",
            example = json!([
                {
                    "twitter_id": 1532054431069224961i64,
                    "username": "jane",
                    "text": "uranium prices are rising",
                    "created_at": "2022-06-01T17:02:11",
                    "verified_user": false,
                    "followers": 1200,
                    "sentiment": "positive"
                }
            ])
        )
    )
)]
#[get("/stream/latest")]
pub(crate) async fn stream_latest(
    pools: web::Data<Pools>,
    query: web::Query<LatestQuery>,
) -> impl Responder {
    let conn = match connection(&pools.stream).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let sql = "
    SELECT
        twitter_id,
        username,
        text,
        created_at,
        verified_user,
        followers,
        sentiment
    FROM tweet_stream
    ORDER BY created_at DESC NULLS LAST, id DESC
    LIMIT $1";
    let rows = match conn.query(sql, &[&query.limit()]).await {
        Ok(rows) => rows,
        Err(e) => return query_failed(e),
    };

    let data: Vec<StreamedTweet> = rows
        .iter()
        .map(|row| StreamedTweet {
            twitter_id: row.get("twitter_id"),
            username: row.get("username"),
            text: row.get("text"),
            created_at: row.get("created_at"),
            verified_user: row.get("verified_user"),
            followers: row.get("followers"),
            sentiment: row.get("sentiment"),
        })
        .collect();

    HttpResponse::Ok().json(data)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Share of each sentiment among the backfilled tweets of one day; the shares are null
/// when none of that day's tweets were classified.
#[derive(Deserialize, Serialize, utoipa::ToSchema)]
struct DailySentiment {
    day: chrono::NaiveDate,
    total: i64,
    negative: Option<f64>,
    neutral: Option<f64>,
    positive: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/tweets/sentiment",
    responses(
        (
            status = 200,
            description = "Per-day share of negative, neutral and positive backfilled tweets, newest first",
            body = [DailySentiment],
            content_type = "application/json",
            example = json!([
                {
                    "day": "2022-06-01",
                    "total": 100,
                    "negative": 0.12,
                    "neutral": 0.55,
                    "positive": 0.33
                }
            ])
        )
    )
)]
#[get("/tweets/sentiment")]
pub(crate) async fn daily_sentiment(pools: web::Data<Pools>) -> impl Responder {
    let conn = match connection(&pools.batch).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let sql = format!("{DAILY_SENTIMENT} ORDER BY day DESC");
    let rows = match conn.query(sql.as_str(), &[]).await {
        Ok(rows) => rows,
        Err(e) => return query_failed(e),
    };

    let data: Vec<DailySentiment> = rows
        .iter()
        .map(|row| DailySentiment {
            day: row.get("day"),
            total: row.get("total"),
            negative: row.get("negative"),
            neutral: row.get("neutral"),
            positive: row.get("positive"),
        })
        .collect();

    HttpResponse::Ok().json(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_bounds() {
        assert_eq!(LatestQuery { limit: None }.limit(), 5);
        assert_eq!(LatestQuery { limit: Some(20) }.limit(), 20);
        assert_eq!(LatestQuery { limit: Some(1000) }.limit(), 100);
        assert_eq!(LatestQuery { limit: Some(0) }.limit(), 1);
    }

    #[test]
    fn unclassified_days_have_null_shares() {
        let day = DailySentiment {
            day: chrono::NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
            total: 3,
            negative: None,
            neutral: None,
            positive: None,
        };
        assert_eq!(
            serde_json::to_value(&day).unwrap(),
            serde_json::json!({
                "day": "2022-06-01",
                "total": 3,
                "negative": null,
                "neutral": null,
                "positive": null
            })
        );
    }
}
