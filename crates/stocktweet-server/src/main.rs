mod rest_api;

use actix_web::{middleware::Logger, web, App, HttpServer};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use dotenv::var;
use stocktweet_spider::config::{
    CredentialProvider, DbParams, DbTargets, EnvCredentials, SsmCredentials,
};
use tokio_postgres::NoTls;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

/// Read-only pools of the two databases behind the dashboard.
pub(crate) struct Pools {
    pub batch: Pool,
    pub stream: Pool,
}

fn pool(params: &DbParams) -> std::io::Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(params.host.clone());
    cfg.port = Some(params.port);
    cfg.dbname = Some(params.db.clone());
    cfg.user = Some(params.user.clone());
    cfg.password = Some(params.password.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(std::io::Error::other)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // batch login from SSM when STOCKTWEET_SECRETS=ssm
    let secrets: Box<dyn CredentialProvider> = match var("STOCKTWEET_SECRETS").as_deref() {
        Ok("ssm") => Box::new(SsmCredentials::new().await),
        _ => Box::new(EnvCredentials),
    };
    let targets = DbTargets::from_env().map_err(std::io::Error::other)?;
    let batch = targets
        .batch_creds(secrets.as_ref())
        .await
        .map_err(std::io::Error::other)?;
    let pools = web::Data::new(Pools {
        batch: pool(&batch)?,
        stream: pool(&targets.stream_creds())?,
    });
    log::info!("pools created for {batch:?}");

    // create API documentation
    #[derive(OpenApi)]
    #[openapi(paths(
        rest_api::tweets::stream_count,
        rest_api::tweets::stream_latest,
        rest_api::tweets::daily_sentiment,
        rest_api::stock::prices,
        rest_api::stock::dashboard,
    ))]
    struct ApiDoc;

    let port: u16 = var("SERVER_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(11234);

    // run server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(pools.clone())
            .service(rest_api::tweets::stream_count)
            .service(rest_api::tweets::stream_latest)
            .service(rest_api::tweets::daily_sentiment)
            .service(rest_api::stock::prices)
            .service(rest_api::stock::dashboard)
            .service(Redoc::with_url("/redoc", ApiDoc::openapi()))
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}
