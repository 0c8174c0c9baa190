//! Demo driver: print tweets from the sample or filtered feed, or check
//! that the configured credentials are accepted.
//!
//! Credentials come from `TWITTER_*` environment variables. Ctrl-C stops the
//! stream cleanly.

use std::sync::Arc;

use anyhow::Context;
use birdwire_telemetry::{TelemetryConfig, init_telemetry, redact_sensitive};
use birdwire_twitter::{
    FilteredStream, Flow, SimpleStream, Tweet, TweetStream, TwitterConfig, User,
};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "birdwire-twitter", version, about = "Print tweets from a streaming feed")]
struct Cli {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, env = "BIRDWIRE_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    /// Stop after this many tweets
    #[arg(long, global = true)]
    limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read the plain sample feed
    Sample,

    /// Read statuses matching keywords
    Filter {
        /// Keyword to track (repeatable)
        #[arg(long = "track", required = true)]
        tracks: Vec<String>,
    },

    /// Check the credentials against the REST API and exit
    Verify,
}

const VERIFY_CREDENTIALS_PATH: &str = "/1.1/account/verify_credentials.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::new("birdwire-twitter")
        .with_log_level(&cli.log_level)
        .with_json_logs(cli.json_logs);
    init_telemetry(&telemetry)?;

    let config = TwitterConfig::from_env().context("loading credentials")?;
    let shown = redact_sensitive(&serde_json::to_value(&config)?, &telemetry.redact_fields);
    info!(config = %shown, "Loaded configuration");
    let token = config.token()?;

    match cli.command {
        Command::Sample => {
            let stream = Arc::new(SimpleStream::from_config(&config));
            let interrupt = stop_on_ctrl_c(Arc::clone(&stream));
            stream.start_stream(&token, printer(cli.limit)).await?;
            interrupt.abort();
        }
        Command::Filter { tracks } => {
            let stream = Arc::new(FilteredStream::from_config(&config));
            for track in tracks {
                stream.add_track(track);
            }
            let interrupt = stop_on_ctrl_c(Arc::clone(&stream));
            stream.start_stream(&token, printer(cli.limit)).await?;
            interrupt.abort();
        }
        Command::Verify => {
            let body = token
                .execute_get(&config.api_endpoint(VERIFY_CREDENTIALS_PATH))
                .await
                .context("verifying credentials")?;
            let user: User = serde_json::from_value(body)?;
            println!("Authenticated as @{} ({})", user.screen_name, user.id);
            return Ok(());
        }
    }

    info!("Stream finished");
    Ok(())
}

fn stop_on_ctrl_c<S>(stream: Arc<S>) -> JoinHandle<()>
where
    S: TweetStream + Send + Sync + 'static,
{
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping stream");
            stream.stop_stream();
        }
    })
}

fn printer(limit: Option<usize>) -> impl FnMut(Tweet) -> Flow + Send {
    let mut seen = 0usize;
    move |tweet| {
        seen += 1;
        println!("@{}: {}", tweet.screen_name().unwrap_or("?"), tweet.text);
        Flow::from_continue(limit.is_none_or(|max| seen < max))
    }
}
