//! fitscribe-relay: streaming suggestion relay for workout logging.
//!
//! `serve` (default) runs the relay in front of the upstream LLM API.
//! `suggest` consumes a running relay and prints the streamed suggestion.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use fitscribe_relay::client::consumer::{ConsumerError, SuggestionClient, SuggestionHandler};
use fitscribe_relay::client::suggestion::Suggestion;
use fitscribe_relay::config::{Cli, Command, Config};
use fitscribe_relay::protocol::SUGGEST_PATH;
use fitscribe_relay::relay::api::{build_router, AppState};
use fitscribe_relay::relay::upstream::UpstreamClient;

const SAMPLE_CONTEXT: &str = "Exercise: Bench Press\n\
                              Today Sets: 75kg x 8, 75kg x 7\n\
                              Last Session: 72.5kg x 8, 72.5kg x 8\n\
                              Goal: Strength";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Logs go to stderr so `suggest` output stays clean on stdout.
    let filter = if cli.verbose {
        "fitscribe_relay=debug,tower_http=debug"
    } else {
        "fitscribe_relay=info,tower_http=info"
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("fitscribe-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_env();
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Suggest {
            endpoint,
            context,
            context_file,
        } => suggest(&config, endpoint, context, context_file).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let api_key = config.require_api_key()?;
    let upstream = UpstreamClient::new(&config.upstream, api_key)
        .context("failed to build upstream HTTP client")?;

    info!(
        upstream = %config.upstream.responses_url(),
        model = %config.upstream.model,
        connect_timeout_secs = config.upstream.connect_timeout_secs,
        "Configuration loaded"
    );

    let state = Arc::new(AppState { upstream });
    let app = build_router(state);

    let listen_addr = config.server.listen;
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}{SUGGEST_PATH}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Prints deltas as they arrive and keeps the full text for parsing.
#[derive(Default)]
struct PrintHandler {
    text: String,
    error: Option<ConsumerError>,
}

impl SuggestionHandler for PrintHandler {
    fn on_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    fn on_complete(&mut self) {
        println!();
    }

    fn on_error(&mut self, error: ConsumerError) {
        self.error = Some(error);
    }
}

async fn suggest(
    config: &Config,
    endpoint: String,
    context: Option<String>,
    context_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let context = match (context, context_file) {
        (Some(context), _) => context,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read context from {}", path.display()))?,
        (None, None) => SAMPLE_CONTEXT.to_string(),
    };

    let client = SuggestionClient::new(endpoint, &config.client)?;
    info!(endpoint = client.endpoint(), "Requesting suggestion");

    let mut handler = PrintHandler::default();
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    client
        .stream_suggestion_until(&context, &mut handler, interrupted)
        .await
        .context("interrupted")?;

    if let Some(error) = handler.error {
        return Err(error.into());
    }

    let suggestion = Suggestion::parse(&handler.text);
    if suggestion.is_empty() {
        warn!("Response did not follow the output template");
    } else {
        info!(suggestion = %serde_json::to_string(&suggestion)?, "Parsed suggestion");
    }

    Ok(())
}
