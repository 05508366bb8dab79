//! streamrelay
//!
//! Streams a raw audio file, followed by optional interrupt and transcript
//! events, to a WebSocket peer through a `StreamRelay`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use streamrelay::connection::{WebSocketConnection, spawn_inbound_logger};
use streamrelay::{RelayStatus, StreamRelay};
use streamrelay_core::config::{Config, ConfigSource, LoadedConfig, load_config};
use streamrelay_core::tracing_init::{default_filter, init_tracing};
use streamrelay_core::{AudioEncoding, Sender, TranscriptEvent};

#[derive(Parser, Debug)]
#[command(name = "streamrelay")]
#[command(
    version,
    about = "streamrelay - relay audio, interrupt and transcript events to a WebSocket peer"
)]
struct Args {
    /// WebSocket URL to stream to (ws:// or wss://).
    #[arg(long, env = "STREAMRELAY_URL")]
    url: String,

    /// Raw audio file in the configured sample rate and encoding.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Duration of each audio chunk in milliseconds.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    chunk_ms: u32,

    /// Send chunks as fast as possible instead of in real time.
    #[arg(long)]
    no_pacing: bool,

    /// Send an interrupt signal after the audio.
    #[arg(long)]
    interrupt: bool,

    /// Transcript line to send after the audio. Repeatable.
    #[arg(long = "transcript")]
    transcripts: Vec<String>,

    /// Override the configured sample rate (Hz).
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Override the configured audio encoding (linear16, mulaw).
    #[arg(long)]
    encoding: Option<AudioEncoding>,

    /// Project directory containing `.streamrelay/settings.json`.
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Seconds to wait for queued events to be delivered before giving up.
    #[arg(long, default_value_t = 10)]
    drain_timeout: u64,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply CLI overrides. Returns whether any flag changed the config.
    fn apply_overrides(&self, config: &mut Config) -> bool {
        let mut changed = false;
        if let Some(rate) = self.sample_rate {
            config.relay.sample_rate = rate;
            changed = true;
        }
        if let Some(encoding) = self.encoding {
            config.relay.audio_encoding = encoding;
            changed = true;
        }
        if self.log_json {
            config.logging.json = true;
            changed = true;
        }
        changed
    }

    /// Resolve every layer, CLI last, and validate the result.
    fn resolve_config(&self, mut loaded: LoadedConfig) -> anyhow::Result<LoadedConfig> {
        if self.apply_overrides(&mut loaded.config) {
            loaded.record(ConfigSource::Cli);
        }
        loaded.config.relay.validate()?;
        Ok(loaded)
    }
}

fn log_config_sources(loaded: &LoadedConfig) {
    for (source, path) in &loaded.layers {
        match path {
            Some(path) => debug!(?source, path = %path.display(), "Config layer applied"),
            None => debug!(?source, "Config layer applied"),
        }
    }
    for ignored in &loaded.ignored {
        warn!(
            key = ignored.key,
            value = %ignored.value,
            error = %ignored.reason,
            "Ignoring invalid environment override"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = args.resolve_config(load_config(args.project_dir.as_deref())?)?;
    let config = &loaded.config;

    init_tracing(&default_filter(&config.logging.level), config.logging.json);
    log_config_sources(&loaded);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        url = %args.url,
        sample_rate = config.relay.sample_rate,
        encoding = %config.relay.audio_encoding,
        "Starting streamrelay"
    );

    let (ws, reader) = WebSocketConnection::connect(&args.url).await?;
    let ws = Arc::new(ws);
    let inbound = spawn_inbound_logger(reader);

    let relay = StreamRelay::from_config(ws.clone(), &config.relay)?;
    relay.start()?;

    tokio::select! {
        result = produce(&relay, &args) => {
            let chunks = result?;
            info!(chunks, "Input exhausted, draining relay");
            relay.mark_closed();
            drain(&relay, Duration::from_secs(args.drain_timeout), tokio::signal::ctrl_c()).await;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            relay.terminate().await;
        }
    }

    let stats = relay.stats();
    info!(
        delivered = stats.delivered,
        dropped_inactive = stats.dropped_inactive,
        dropped_overflow = stats.dropped_overflow,
        dropped_encoding = stats.dropped_encoding,
        abandoned = stats.abandoned,
        status = %relay.status(),
        "Relay stopped"
    );

    if let Err(e) = ws.close().await {
        warn!(error = %e, "Failed to close WebSocket cleanly");
    }
    inbound.abort();

    if let RelayStatus::Failed(reason) = relay.status() {
        anyhow::bail!("delivery failed: {reason}");
    }
    Ok(())
}

/// Wait for a closed relay to deliver what it has queued. Gives up and
/// terminates on `timeout` or when `shutdown` resolves first.
async fn drain<F>(relay: &StreamRelay, timeout: Duration, shutdown: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        status = relay.wait_finished() => {
            debug!(%status, "Relay drained");
        }
        () = tokio::time::sleep(timeout) => {
            warn!(
                queued = relay.queued_len(),
                timeout_secs = timeout.as_secs(),
                "Drain timed out, terminating"
            );
            relay.terminate().await;
        }
        _ = shutdown => {
            info!(queued = relay.queued_len(), "Received shutdown signal while draining");
            relay.terminate().await;
        }
    }
}

/// Feed the relay: audio chunks, then the interrupt, then transcripts.
/// Returns the number of audio chunks enqueued.
async fn produce(relay: &StreamRelay, args: &Args) -> anyhow::Result<usize> {
    let mut chunks = 0;
    if let Some(path) = &args.input {
        chunks = stream_audio(relay, path, args.chunk_ms, !args.no_pacing).await?;
    }
    if args.interrupt {
        relay.enqueue_interrupt(true);
    }
    for line in &args.transcripts {
        relay.enqueue_transcript(&TranscriptEvent::now(line.as_str(), Sender::Bot));
    }
    Ok(chunks)
}

async fn stream_audio(
    relay: &StreamRelay,
    path: &Path,
    chunk_ms: u32,
    paced: bool,
) -> anyhow::Result<usize> {
    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let chunk_bytes = relay.format().chunk_bytes(chunk_ms).max(1);
    info!(
        path = %path.display(),
        bytes = audio.len(),
        chunk_bytes,
        paced,
        "Streaming audio file"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(u64::from(chunk_ms)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut count = 0;
    for chunk in audio.chunks(chunk_bytes) {
        if paced {
            ticker.tick().await;
        }
        relay.enqueue_audio(chunk);
        count += 1;
    }
    Ok(count)
}
