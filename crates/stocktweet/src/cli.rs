use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,

    /// Where database logins and Twitter keys are read from.
    #[arg(short, long, global = true, default_value = "env")]
    pub secrets: Secrets,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drop and create the tables of the batch and stream databases.
    Setup {
        /// Specify the tables to create.
        ///
        /// If no tables are provided, setup will create all.
        #[arg(long)]
        tables: Option<Vec<Table>>,
    },

    /// Publish raw tweets to the tweet topic until interrupted.
    Produce {
        /// Keywords of the filtered stream.
        #[arg(long, default_value = "uranium")]
        track: Vec<String>,

        /// Replay newline-delimited tweets from a file instead of the Twitter stream.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Consume the tweet topic into `tweet_stream` until interrupted.
    Consume,

    /// Load historical stock prices and tweets into the batch database.
    Backfill {
        /// Specify the endpoints to backfill.
        ///
        /// If no endpoints are provided, backfill will collect all.
        #[arg(short, long)]
        endpoints: Option<Vec<Endpoint>>,

        #[arg(long, default_value = "URA")]
        ticker: String,

        #[arg(long, default_value = "Uranium ETF")]
        name: String,

        /// Search query of the tweet backfill.
        #[arg(long, default_value = "uranium")]
        query: String,

        /// Tweets searched per day.
        #[arg(long, default_value_t = 100)]
        count: usize,

        /// Archive raw tweets to this directory instead of S3.
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Secrets {
    /// Environment variables (and `.env`).
    Env,

    /// AWS SSM parameter store.
    Ssm,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Table {
    /// `stock` and `stock_price`.
    Stocks,

    /// `tweet`.
    Tweets,

    /// `tweet_stream`.
    Stream,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// One year of daily closes.
    Stocks,

    /// The last eight days of tweets.
    Tweets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfill_defaults() {
        let cli = Cli::parse_from(["stocktweet", "backfill", "-e", "stocks"]);
        assert_eq!(cli.secrets, Secrets::Env);
        match cli.command {
            Commands::Backfill {
                endpoints,
                ticker,
                name,
                count,
                ..
            } => {
                assert_eq!(endpoints, Some(vec![Endpoint::Stocks]));
                assert_eq!(ticker, "URA");
                assert_eq!(name, "Uranium ETF");
                assert_eq!(count, 100);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::parse_from(["stocktweet", "consume", "--trace", "DEBUG", "-s", "ssm"]);
        assert_eq!(cli.trace, Some(TraceLevel::DEBUG));
        assert_eq!(cli.secrets, Secrets::Ssm);
    }
}
