use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use voice_companion::services::http::{HttpGenerator, HttpTranscriber};
use voice_companion::services::{NullSynthesizer, Synthesizer, Transcriber};
use voice_companion::workers::{DocumentWorker, GenerationWorker, SynthesisWorker};
use voice_companion::{
    create_router, AppState, AudioAggregator, Config, ResponseRouter, SessionReaper,
    SessionRegistry, StreamBus, TriggerDetector,
};

#[derive(Debug, Parser)]
#[command(name = "voice-companion", about = "Streaming voice companion server")]
struct Args {
    /// Config file (without extension), as understood by the config crate
    #[arg(long, default_value = "config/voice-companion")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} starting", cfg.service.name);

    let bus = Arc::new(StreamBus::new(cfg.bus.max_stream_len));
    let registry = Arc::new(SessionRegistry::new());

    let transcriber: Arc<dyn Transcriber> = Arc::new(
        HttpTranscriber::new(&cfg.transcription).context("Failed to build transcriber")?,
    );
    let generator =
        Arc::new(HttpGenerator::new(&cfg.generation).context("Failed to build generator")?);
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(NullSynthesizer);

    // One long-lived task per component role; each owns its own cursor.
    tokio::spawn(
        AudioAggregator::new(
            Arc::clone(&bus),
            Arc::clone(&registry),
            transcriber,
            cfg.audio.clone(),
            cfg.bus.clone(),
        )
        .run(),
    );
    tokio::spawn(
        TriggerDetector::new(
            Arc::clone(&bus),
            Arc::clone(&registry),
            cfg.trigger.clone(),
            cfg.bus.clone(),
        )
        .run(),
    );
    tokio::spawn(
        ResponseRouter::new(Arc::clone(&bus), Arc::clone(&registry), cfg.bus.clone()).run(),
    );
    tokio::spawn(SessionReaper::new(Arc::clone(&registry), &cfg.reaper).run());
    tokio::spawn(
        GenerationWorker::new(
            Arc::clone(&bus),
            generator,
            cfg.trigger.clone(),
            cfg.synthesis.clone(),
            cfg.bus.clone(),
        )
        .run(),
    );
    tokio::spawn(
        SynthesisWorker::new(
            Arc::clone(&bus),
            synthesizer,
            cfg.synthesis.clone(),
            cfg.bus.clone(),
        )
        .run(),
    );
    tokio::spawn(DocumentWorker::new(Arc::clone(&bus), cfg.bus.clone()).run());

    let app = create_router(AppState::new(bus, registry));
    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {} (WebSocket clients connect to /ws)", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
