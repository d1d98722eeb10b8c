pub(crate) mod stock;
pub(crate) mod tweets;

use actix_web::HttpResponse;
use deadpool_postgres::{Client, Pool};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Daily shares of each sentiment in `tweet`, shared by the sentiment and dashboard views.
pub(crate) const DAILY_SENTIMENT: &str = "
    SELECT
        created_at::DATE AS day,
        COUNT(*) AS total,
        AVG((sentiment = 'negative')::INT)::FLOAT8 AS negative,
        AVG((sentiment = 'neutral')::INT)::FLOAT8 AS neutral,
        AVG((sentiment = 'positive')::INT)::FLOAT8 AS positive
    FROM tweet
    WHERE created_at IS NOT NULL
    GROUP BY day";

/// Connection from `pool`, or the response to send when none is available.
pub(crate) async fn connection(pool: &Pool) -> Result<Client, HttpResponse> {
    pool.get().await.map_err(|e| {
        log::error!("failed to get connection from pool: {e}");
        HttpResponse::ServiceUnavailable().body("Database unavailable")
    })
}

pub(crate) fn query_failed(e: tokio_postgres::Error) -> HttpResponse {
    log::error!("{e}");
    HttpResponse::InternalServerError().body("Query execution failed")
}
