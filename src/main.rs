//! # Voice Playback - Main Application Entry Point
//!
//! Runs one playback session against a simulated audio device:
//!
//! ## What happens:
//! - Inbound signals are read from stdin, one JSON object per line
//!   (`{"type": "audio_chunk", "samples": [...]}`, `{"type": "interrupt"}`, ...), or as
//!   length-prefixed frames carrying JSON or raw audio when `signal.input = "framed"`
//! - A host clock task pulls one quantum per tick, like an audio callback would
//! - A monitor task logs playback stats periodically
//! - On end of input the buffer is allowed to drain, then everything shuts down
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: stdin, the clock and the monitor all run on the tokio runtime
//! - **watch channel**: one shutdown flag observed by every task
//! - **Arc**: the session is shared between the reader loop and the monitor
//! - **Result<T, E>**: `anyhow::Result` at the top level, `?` everywhere below

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_playback::audio::driver::PlaybackState;
use voice_playback::audio::session::{PlaybackSession, SessionManager};
use voice_playback::audio::pcm::SampleFormat;
use voice_playback::audio::signal::{decode_text, read_frame, InboundSignal};
use voice_playback::config::{AppConfig, InputMode, SignalConfig};
use voice_playback::host::{run_host_clock, write_wav, CaptureSink, DiscardSink};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates a playback session** and starts the host clock on it
/// 4. **Forwards stdin signals** into the session until input ends or a signal arrives
/// 5. **Shuts down gracefully**: final stats, optional WAV output
#[tokio::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-playback v{}", env!("CARGO_PKG_VERSION"));
    info!(
        sample_rate = config.playback.sample_rate,
        quantum_size = config.playback.quantum_size,
        pre_roll_ms = config.playback.pre_roll_ms,
        "Configuration loaded"
    );
    debug!("Effective configuration:\n{}", config.to_toml_string()?);

    let sessions = SessionManager::new(
        config.session.max_concurrent_sessions,
        config.store_config(),
    );
    let session = sessions.create_session(None)?;
    let output = session.start()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    setup_signal_handlers(Arc::clone(&shutdown_tx));

    // Only keep rendered audio around when it's going to be written out
    let quantum_size = config.playback.quantum_size;
    let period = config.quantum_duration();
    let clock_shutdown = shutdown_rx.clone();
    let clock = if config.wav_path().is_some() {
        tokio::spawn(async move {
            run_host_clock(output, quantum_size, period, CaptureSink::new(), clock_shutdown)
                .await
                .into_samples()
        })
    } else {
        tokio::spawn(async move {
            run_host_clock(output, quantum_size, period, DiscardSink::default(), clock_shutdown)
                .await;
            Vec::new()
        })
    };

    let monitor = spawn_stats_monitor(
        Arc::clone(&session),
        config.session.stats_interval_secs,
        shutdown_rx.clone(),
    );

    let input_finished = forward_stdin(&session, &config.signal, shutdown_rx.clone()).await;
    if input_finished {
        wait_for_drain(&session, period, shutdown_rx.clone()).await;
    }

    if let Err(e) = session.end() {
        debug!(error = %e, "Session already closed");
    }
    let _ = shutdown_tx.send(true);

    let rendered = clock.await.unwrap_or_else(|e| {
        error!("Host clock task error: {}", e);
        Vec::new()
    });
    if let Err(e) = monitor.await {
        error!("Stats monitor task error: {}", e);
    }

    let summary = session.summary();
    info!(
        session_id = %summary.session_id,
        duration_seconds = summary.duration_seconds,
        samples_written = summary.stats.samples_written,
        samples_played = summary.stats.samples_played,
        growths = summary.stats.growths,
        interrupts = summary.stats.interrupts,
        underflow_ratio = summary.stats.underflow_ratio(),
        "Playback finished"
    );
    debug!("Final session summary: {}", serde_json::to_string(&summary)?);

    if let Some(path) = config.wav_path() {
        write_wav(path, config.playback.sample_rate, &rendered)?;
        info!(path = %path.display(), samples = rendered.len(), "Rendered output written");
    }

    sessions.cleanup_ended_sessions();
    info!("Stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "info", "voice_playback=trace")
/// - If not set, defaults to "voice_playback=debug"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_playback=debug".into()),
        )
        // keep stdout clean
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM (termination signal from system)
/// - Listens for SIGINT (interrupt signal, usually Ctrl+C)
/// - When either signal is received, flips the shared shutdown flag
fn setup_signal_handlers(shutdown: Arc<watch::Sender<bool>>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        let _ = shutdown.send(true);
    });
}

/// Periodically log the session's playback stats. Disabled when `interval_secs` is 0.
fn spawn_stats_monitor(
    session: Arc<PlaybackSession>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if interval_secs == 0 {
            return;
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // the first tick completes immediately and there's nothing to report yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = session.stats().snapshot();
                    info!(
                        state = session.state().as_str(),
                        occupied = snapshot.occupied,
                        capacity = snapshot.capacity,
                        underflow_count = snapshot.underflow_count,
                        contended_quanta = snapshot.contended_quanta,
                        playing_ratio = snapshot.playing_ratio(),
                        "Playback stats"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Read signals from stdin into the session, in the configured input mode.
///
/// Returns true when input ended on its own, false when a shutdown signal or a read error cut
/// it short.
async fn forward_stdin(
    session: &PlaybackSession,
    signal_config: &SignalConfig,
    shutdown: watch::Receiver<bool>,
) -> bool {
    match signal_config.input {
        InputMode::JsonLines => forward_lines(session, shutdown).await,
        InputMode::Framed => forward_frames(session, signal_config.sample_format, shutdown).await,
    }
}

fn apply_signal(session: &PlaybackSession, signal: Option<InboundSignal>) {
    match signal {
        Some(signal) => {
            session.handle_signal(&signal);
        }
        None => session.stats().record_ignored_signal(),
    }
}

async fn forward_lines(session: &PlaybackSession, mut shutdown: watch::Receiver<bool>) -> bool {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        apply_signal(session, decode_text(line));
                    }
                }
                Ok(None) => {
                    info!("Input closed, draining buffered audio");
                    return true;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    session.set_error(e.to_string());
                    return false;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received, stopping playback...");
                    return false;
                }
            }
        }
    }
}

async fn forward_frames(
    session: &PlaybackSession,
    format: SampleFormat,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let mut stdin = BufReader::new(tokio::io::stdin());
    info!(format = format.as_str(), "Reading framed input");

    loop {
        tokio::select! {
            frame = read_frame(&mut stdin) => match frame {
                Ok(Some(frame)) => apply_signal(session, frame.decode(format)),
                Ok(None) => {
                    info!("Input closed, draining buffered audio");
                    return true;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input frame");
                    session.set_error(e.to_string());
                    return false;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received, stopping playback...");
                    return false;
                }
            }
        }
    }
}

/// Wait until the host clock has played everything that was buffered.
///
/// A tail shorter than the pre-roll cushion that arrives after a full drain stays gated and is
/// not waited for.
async fn wait_for_drain(
    session: &PlaybackSession,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));

    loop {
        if session.occupied() == 0 || session.state() == PlaybackState::PreRolling {
            return;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
