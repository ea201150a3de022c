//! CLI binary for seeker.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use seeker::pipeline::{Complexity, Query, StreamEvent};
use seeker::server::{AppState, SeekerServer};
use seeker::SeekerConfig;
use tracing_subscriber::EnvFilter;

/// Seeker: cited answers from web, academic and video sources.
#[derive(Parser)]
#[command(name = "seeker", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Override the configured port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer one question and print it with its sources.
    Ask {
        question: String,

        /// Force a complexity tier instead of the detected one.
        #[arg(short, long)]
        mode: Option<Complexity>,

        /// Read these pages instead of searching.
        #[arg(short, long = "url")]
        urls: Vec<String>,
    },

    /// Write the default configuration to the config path.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SeekerConfig::from_file(path)?,
        None => SeekerConfig::load()?,
    };

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Ask {
            question,
            mode,
            urls,
        } => ask(config, question, mode, urls).await,
        Command::InitConfig => {
            let path = cli.config.unwrap_or_else(SeekerConfig::default_config_path);
            SeekerConfig::default().save_to_file(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

async fn serve(mut config: SeekerConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let state = AppState::from_config(&config)?;
    let mut server = SeekerServer::start(state, &config.server).await?;
    println!("Seeker v{} on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::select! {
        () = server.wait() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }
    server.shutdown();
    Ok(())
}

async fn ask(
    config: SeekerConfig,
    question: String,
    mode: Option<Complexity>,
    urls: Vec<String>,
) -> anyhow::Result<()> {
    config.validate()?;
    let state = AppState::from_config(&config)?;
    let pipeline = Arc::clone(state.pipeline());

    let mut query = Query::new(question);
    if let Some(mode) = mode {
        query = query.with_mode(mode);
    }
    if !urls.is_empty() {
        query = query.with_urls(urls);
    }

    let (mut events, cancel) = pipeline.stream(query);
    let _guard = cancel.drop_guard();
    let mut citations = Vec::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Status { phase } => tracing::info!(%phase, "phase"),
            StreamEvent::Mode {
                complexity,
                routed_as,
                ..
            } => tracing::info!(%complexity, %routed_as, "mode"),
            StreamEvent::Citation { citation } => citations.push(citation),
            StreamEvent::Content { text } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamEvent::Done => break,
            StreamEvent::Error { message } => anyhow::bail!(message),
        }
    }

    if !citations.is_empty() {
        writeln!(stdout, "\n\nSources:")?;
        for c in &citations {
            writeln!(stdout, "  [{}] {} - {}", c.id, c.title, c.url)?;
        }
    }
    writeln!(stdout)?;
    Ok(())
}
