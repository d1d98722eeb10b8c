use super::{connection, query_failed, DAILY_SENTIMENT};
use crate::Pools;
use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

/// Daily close.
#[derive(Deserialize, Serialize, utoipa::ToSchema)]
struct StockPrice {
    timestamp: chrono::NaiveDateTime,
    price: Option<f64>,
}

/// Price history
///
/// ```json
/// [
///     {
///         "timestamp": "2022-06-01T00:00:00",
///         "price": 23.46
///     },
///     ...
/// ]
/// ```
#[utoipa::path(
    get,
    path = "/stock/{ticker}/prices",
    params(("ticker" = String, Path, description = "Ticker symbol, e.g. URA")),
    responses(
        (
            status = 200,
            description = "Daily closes of the ticker, newest first",
            body = [StockPrice],
            content_type = "application/json",
            example = json!([{"timestamp": "2022-06-01T00:00:00", "price": 23.46}])
        )
    )
)]
#[get("/stock/{ticker}/prices")]
pub(crate) async fn prices(
    pools: web::Data<Pools>,
    ticker: web::Path<String>,
) -> impl Responder {
    let ticker = ticker.into_inner();
    let conn = match connection(&pools.batch).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let query = "
    SELECT
        timestamp,
        price::FLOAT8 AS price
    FROM stock_price
    WHERE ticker = $1
    ORDER BY timestamp DESC";
    let rows = match conn.query(query, &[&ticker]).await {
        Ok(rows) => rows,
        Err(e) => return query_failed(e),
    };

    let data: Vec<StockPrice> = rows
        .iter()
        .map(|row| StockPrice {
            timestamp: row.get("timestamp"),
            price: row.get("price"),
        })
        .collect();

    HttpResponse::Ok().json(data)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Close of one day next to the sentiment of that day's tweets; the shares are null on
/// days without tweets.
#[derive(Deserialize, Serialize, utoipa::ToSchema)]
struct DashboardDay {
    day: chrono::NaiveDate,
    price: Option<f64>,
    tweets: Option<i64>,
    negative: Option<f64>,
    neutral: Option<f64>,
    positive: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/dashboard/{ticker}",
    params(("ticker" = String, Path, description = "Ticker symbol, e.g. URA")),
    responses(
        (
            status = 200,
            description = "Per-day close joined with the sentiment shares of the same day, newest first",
            body = [DashboardDay],
            content_type = "application/json",
            example = json!([
                {
                    "day": "2022-06-01",
                    "price": 23.46,
                    "tweets": 100,
                    "negative": 0.12,
                    "neutral": 0.55,
                    "positive": 0.33
                }
            ])
        )
    )
)]
#[get("/dashboard/{ticker}")]
pub(crate) async fn dashboard(
    pools: web::Data<Pools>,
    ticker: web::Path<String>,
) -> impl Responder {
    let ticker = ticker.into_inner();
    let conn = match connection(&pools.batch).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let query = format!(
        "
    WITH daily AS ({DAILY_SENTIMENT})
    SELECT
        p.timestamp::DATE AS day,
        p.price::FLOAT8 AS price,
        d.total AS tweets,
        d.negative,
        d.neutral,
        d.positive
    FROM stock_price p
    LEFT JOIN daily d ON d.day = p.timestamp::DATE
    WHERE p.ticker = $1
    ORDER BY day DESC"
    );
    let rows = match conn.query(query.as_str(), &[&ticker]).await {
        Ok(rows) => rows,
        Err(e) => return query_failed(e),
    };

    let data: Vec<DashboardDay> = rows
        .iter()
        .map(|row| DashboardDay {
            day: row.get("day"),
            price: row.get("price"),
            tweets: row.get("tweets"),
            negative: row.get("negative"),
            neutral: row.get("neutral"),
            positive: row.get("positive"),
        })
        .collect();

    HttpResponse::Ok().json(data)
}
