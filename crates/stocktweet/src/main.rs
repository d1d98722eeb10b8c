mod backfill;
mod cli;
mod setup;
mod stream;

// remote imports
use clap::Parser;
use cli::{Cli, Secrets, TraceLevel};
use stocktweet_spider::config::{CredentialProvider, EnvCredentials, SsmCredentials};
use tokio_util::sync::CancellationToken;
use tracing::{info, subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

// preproccess the trace level
fn preprocess(trace_level: Level) {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber).expect("Set subscriber");
}

async fn credentials(secrets: Secrets) -> Box<dyn CredentialProvider> {
    match secrets {
        Secrets::Env => Box::new(EnvCredentials),
        Secrets::Ssm => Box::new(SsmCredentials::new().await),
    }
}

/// Cancels `token` on ctrl-c; long-running loops stop between polls.
fn shutdown_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down ...");
            token.cancel();
        }
    });
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        });
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui
    let tui = cli.trace.is_none();
    let secrets = credentials(cli.secrets).await;

    let token = CancellationToken::new();
    shutdown_on_ctrl_c(token.clone());

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `stocktweet setup <Option<Vec<Table>>>`: (re)create tables
        Setup { tables } => setup::run(secrets.as_ref(), tables).await?,

        // `stocktweet produce`: twitter -> topic
        Produce { track, file } => stream::produce(secrets.as_ref(), track, file, token).await?,

        // `stocktweet consume`: topic -> tweet_stream
        Consume => stream::consume(token).await?,

        // `stocktweet backfill <Option<Vec<Endpoint>>>`: external APIs -> batch DB
        Backfill {
            endpoints,
            ticker,
            name,
            query,
            count,
            archive_dir,
        } => {
            let jobs = backfill::Jobs {
                ticker,
                name,
                query,
                count,
                archive_dir,
            };
            backfill::run(secrets.as_ref(), endpoints, jobs, tui).await?
        }
    }

    Ok(())
}
