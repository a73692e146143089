use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use svenska_practice::{
    create_router, AppState, AudioBackendConfig, AudioFile, Collaborators, Config, FileLevelStore,
    HttpClipLoader, HttpPracticeApi, PlaybackHandle, ScenarioKind, SessionController,
    TracingObserver, WavFileBackend,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "svenska-practice", version, about = "Spoken conversation practice client")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/svenska-practice")]
    config: String,

    /// WAV file used as the microphone
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the local control API
    Serve,
    /// Speak one line (from a WAV file) and print the partner's reply
    Turn {
        #[arg(long)]
        wav: PathBuf,
        /// Situation to build the scenario from; a random one is generated when omitted
        #[arg(long)]
        situation: Option<String>,
    },
    /// Generate a scenario
    Scenario {
        /// Describe your own situation instead of a random one
        #[arg(long)]
        situation: Option<String>,
    },
}

fn build_controller(cfg: &Config, input: PathBuf) -> Result<Arc<SessionController>> {
    let api = HttpPracticeApi::new(&cfg.api)?;
    let backend = WavFileBackend::new(input, AudioBackendConfig::from(&cfg.recording));

    let collaborators = Collaborators {
        api: Arc::new(api),
        backend: Box::new(backend),
        loader: Arc::new(HttpClipLoader::new(&cfg.playback.spool_dir)),
        store: Arc::new(FileLevelStore::new(&cfg.persistence.data_dir)),
        observer: Arc::new(TracingObserver),
    };
    Ok(Arc::new(SessionController::new(collaborators, cfg)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Practice backend: {}", cfg.api.base_url);

    match cli.command {
        Commands::Serve => {
            let input = cli.input.context("--input is required to serve")?;
            let controller = build_controller(&cfg, input)?;
            let app = create_router(AppState::new(Arc::clone(&controller)));

            let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Control API listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            controller.teardown().await;
        }
        Commands::Turn { wav, situation } => {
            let length = {
                let path = wav.clone();
                tokio::task::spawn_blocking(move || AudioFile::open(path)).await??
            };
            let controller = build_controller(&cfg, wav)?;

            let kind = situation.map_or(ScenarioKind::Random, ScenarioKind::Custom);
            let scenario = controller.generate_scenario(kind).await?;
            println!("Scenario: {}", scenario);

            controller.start_recording().await?;
            tokio::time::sleep(Duration::from_secs_f64(length.duration_seconds) + Duration::from_millis(200))
                .await;

            let playback = PlaybackHandle::new();
            let exchange = controller.stop_recording(&playback).await?;
            println!("You:     {}", exchange.transcript);
            println!("Partner: {}", exchange.reply.response);
            if let Some(url) = playback.url() {
                let length = playback
                    .clip()
                    .and_then(|clip| clip.duration)
                    .map(|d| format!(" ({:.1}s)", d.as_secs_f64()))
                    .unwrap_or_default();
                println!("Audio:   {}{}", url, length);
            }

            controller.teardown().await;
        }
        Commands::Scenario { situation } => {
            // No recording happens here, so the input is never opened
            let controller = build_controller(&cfg, cli.input.unwrap_or_default())?;
            let kind = situation.map_or(ScenarioKind::Random, ScenarioKind::Custom);
            let scenario = controller.generate_scenario(kind).await?;
            println!("{}", scenario);
            controller.teardown().await;
        }
    }

    Ok(())
}
