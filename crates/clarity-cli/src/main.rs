//! Clarity CLI - chat with a Clarity Coach backend from the terminal.
//!
//! This is the entry point for the `clarity` binary.

mod command;
mod render;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clarity_client::{
    ChatSession, ChatTransport, ClientConfig, HttpTransport, PayloadFormat, SendOutcome,
    TransportMode,
};
use clarity_store::HistoryEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use command::{Command, HELP};
use render::Renderer;

/// How often the renderer shows progress while a reply has not started.
const WAITING_TICK: Duration = Duration::from_millis(500);

/// Clarity CLI - chat with a Clarity Coach backend.
#[derive(Parser, Debug)]
#[command(name = "clarity")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "CLARITY_API_BASE")]
    api_base: Option<String>,

    /// Reply transport: `stream` or `single`.
    #[arg(long, env = "CLARITY_MODE", default_value = "stream")]
    mode: TransportMode,

    /// Encoding of streamed payloads: `raw` or `json`.
    #[arg(long, env = "CLARITY_PAYLOAD_FORMAT", default_value = "raw")]
    payload_format: PayloadFormat,

    /// Seconds to wait for each chunk of a streamed reply.
    #[arg(long, env = "CLARITY_READ_TIMEOUT_SECS", default_value_t = 30)]
    read_timeout: u64,

    /// Query the backend's health endpoint and exit.
    #[arg(long, default_value = "false")]
    check: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self
                .api_base
                .clone()
                .filter(|url| !url.trim().is_empty()),
            mode: self.mode,
            payload_format: self.payload_format,
            read_timeout_seconds: self.read_timeout,
            ..ClientConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("clarity=debug,clarity_client=debug,clarity_store=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = args.config();

    if args.check {
        return check(&config).await;
    }

    if config.base_url.is_none() {
        eprintln!("No backend configured; pass --api-base or set CLARITY_API_BASE.");
    }

    let session = Arc::new(ChatSession::from_config(&config)?);
    tracing::debug!(session_id = %session.session_id(), "Starting chat");

    eprintln!("{HELP}");
    run_chat(session).await
}

/// Print the backend's health and fail if it is not healthy.
async fn check(config: &ClientConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(config)?;
    let health = transport.health().await?;

    println!(
        "{}: status={} model={}",
        transport.base_url(),
        health.status,
        health.model.as_deref().unwrap_or("-")
    );

    if !health.is_ok() {
        anyhow::bail!("backend reported status '{}'", health.status);
    }
    Ok(())
}

/// Read lines from stdin until EOF or `/quit`.
///
/// Sends run on their own tasks so `/stop` and `/reset` stay responsive while
/// a reply streams.
async fn run_chat(session: Arc<ChatSession>) -> anyhow::Result<()> {
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel::<SendOutcome>();
    let renderer = tokio::spawn(render_loop(
        Arc::clone(&session),
        session.subscribe(),
        outcome_rx,
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            None => {}
            Some(Command::Quit) => break,
            Some(Command::Help) => eprintln!("{HELP}"),
            Some(Command::Reset) => session.reset(),
            Some(Command::Stop) => {
                if !session.cancel() {
                    eprintln!("Nothing to stop.");
                }
            }
            Some(Command::Send(text)) => {
                let session = Arc::clone(&session);
                let outcome_tx = outcome_tx.clone();
                tokio::spawn(async move {
                    let outcome = session.send(&text).await;
                    let _ = outcome_tx.send(outcome);
                });
            }
        }
    }

    // Stop any reply in flight; the renderer exits once every send has reported.
    session.cancel();
    drop(outcome_tx);
    renderer.await??;

    Ok(())
}

/// Print history changes and send outcomes as they happen.
async fn render_loop(
    session: Arc<ChatSession>,
    mut events: broadcast::Receiver<HistoryEvent>,
    mut outcomes: mpsc::UnboundedReceiver<SendOutcome>,
) -> io::Result<()> {
    let mut renderer = Renderer::new(io::stdout());
    renderer.render_all(&session.history())?;

    let mut waiting = tokio::time::interval(WAITING_TICK);
    waiting.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            // History events are published before the send reports its outcome.
            biased;

            event = events.recv() => match event {
                Ok(event) => renderer.apply(&event)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer fell behind; redrawing");
                    renderer.render_all(&session.history())?;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            outcome = outcomes.recv() => match outcome {
                Some(outcome) => renderer.outcome(&outcome)?,
                None => break,
            },

            _ = waiting.tick() => {
                if session.is_awaiting_first_token() {
                    renderer.waiting()?;
                }
            }
        }
    }

    renderer.end_reply()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_map_onto_client_config() {
        let args = Args::parse_from([
            "clarity",
            "--api-base",
            "http://localhost:8000",
            "--mode",
            "single",
            "--payload-format",
            "json",
            "--read-timeout",
            "5",
        ]);
        let config = args.config();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.mode, TransportMode::Single);
        assert_eq!(config.payload_format, PayloadFormat::Json);
        assert_eq!(config.read_timeout_seconds, 5);
    }

    #[test]
    fn blank_api_base_is_unset() {
        let args = Args::parse_from(["clarity", "--api-base", "  "]);
        assert_eq!(args.config().base_url, None);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Args::try_parse_from(["clarity", "--mode", "carrier-pigeon"]).is_err());
    }
}
