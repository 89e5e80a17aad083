//! babydream: ambient sleep-sound synthesis, exclusive playback with
//! auto-stop, and wake-window nap forecasting for a baby's day.
//! Library crate: hosts embed `Core` and drive it from their own UI or event store.

pub mod audio;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod metrics;
pub mod playback;
pub mod sleep;

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::runtime::Handle;
use tracing::info;

pub use audio::sink::{AudioSink, MemorySink, SinkError};
pub use audio::{synthesize, SampleBuffer, SoundKey, SynthError};
pub use config::{ConfigError, CoreConfig};
pub use error::ErrorKind;
pub use playback::{PlaybackError, PlaybackManager, PlaybackState};
pub use sleep::prediction::{forecast_from_log, predict, PredictionSnapshot};
pub use sleep::wake_window::{compute_wake_windows, NapConfig, ScheduleError, WakeWindowSchedule};
pub use sleep::{InMemorySleepLog, SleepEntry, SleepKind, SleepLog};

use audio::output::CpalSink;
use metrics::{metric_names, MetricsRegistry};

const DEFAULT_FILTER: &str = "babydream=debug";

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
}

/// Human-readable logs. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// JSON-lines logs for hosts that ship logs elsewhere.
pub fn init_tracing_json() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Everything a host needs: config, the playback manager and shared metrics.
pub struct Core {
    config: CoreConfig,
    playback: PlaybackManager,
    metrics: Arc<MetricsRegistry>,
}

impl Core {
    /// Build a core around `sink`. `runtime` hosts auto-stop timers.
    pub fn new(
        config: CoreConfig,
        sink: Arc<dyn AudioSink>,
        runtime: Handle,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(MetricsRegistry::new());
        let playback = PlaybackManager::new(sink, runtime, Arc::clone(&metrics));
        playback.configure(&config.playback, &config.audio);
        info!(
            sample_rate = config.audio.sample_rate,
            gain = config.playback.gain,
            naps_per_day = config.naps.naps_per_day,
            "babydream core ready"
        );
        Ok(Self {
            config,
            playback,
            metrics,
        })
    }

    /// Core rendering into memory; useful for tests and offline hosts.
    pub fn headless(config: CoreConfig, runtime: Handle) -> Result<Self, ConfigError> {
        let sink = Arc::new(MemorySink::new(config.audio.sample_rate));
        Self::new(config, sink, runtime)
    }

    /// Core playing through the default output device.
    pub fn with_default_output(config: CoreConfig, runtime: Handle) -> Result<Self, CoreError> {
        let sink = Arc::new(CpalSink::open_default()?);
        Ok(Self::new(config, sink, runtime)?)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn playback(&self) -> &PlaybackManager {
        &self.playback
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Render `seconds` of `key` at the configured sample rate.
    pub fn synthesize(&self, key: &str, seconds: f32) -> Result<SampleBuffer, SynthError> {
        let span = self.metrics.span(metric_names::SYNTHESIZE);
        let buffer = synthesize(key, self.config.audio.sample_rate, seconds)?;
        span.finish();
        Ok(buffer)
    }

    pub fn wake_windows(&self) -> Result<WakeWindowSchedule, ScheduleError> {
        compute_wake_windows(&self.config.naps)
    }

    /// Forecast from explicit records.
    pub fn predict(
        &self,
        today: &[SleepEntry],
        in_progress: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Result<PredictionSnapshot, ScheduleError> {
        let span = self.metrics.span(metric_names::FORECAST);
        let snapshot = predict(&self.config.naps, today, in_progress, now)?;
        span.finish();
        Ok(snapshot)
    }

    /// Forecast straight from an event store.
    pub fn forecast(
        &self,
        log: &dyn SleepLog,
        now: NaiveDateTime,
    ) -> Result<PredictionSnapshot, ScheduleError> {
        let span = self.metrics.span(metric_names::FORECAST);
        let snapshot = forecast_from_log(&self.config.naps, log, now)?;
        span.finish();
        Ok(snapshot)
    }

    /// Stop playback and cancel pending timers.
    pub fn shutdown(&self) {
        self.playback.shutdown();
        info!("babydream core shut down");
    }
}

/// Failure building a `Core` on real hardware.
#[derive(Debug)]
pub enum CoreError {
    Config(ConfigError),
    Output(SinkError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(e) => e.kind(),
            CoreError::Output(e) => e.kind(),
        }
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Config(e) => write!(f, "{e}"),
            CoreError::Output(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<SinkError> for CoreError {
    fn from(e: SinkError) -> Self {
        CoreError::Output(e)
    }
}
