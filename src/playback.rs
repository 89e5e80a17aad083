//! Playback lifecycle: Idle ⇄ Playing(key, deadline?).
//! Exactly one synthesized buffer renders at a time. Starting a sound
//! always tears the previous session down first; an optional auto-stop
//! deadline runs as a cancellable tokio task tied to its session's generation.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::sink::{AudioSink, SinkError};
use crate::audio::{SampleBuffer, SoundKey, SynthError};
use crate::cancellation::{GenerationGuard, TaskGeneration};
use crate::config::{AudioConfig, PlaybackConfig};
use crate::error::ErrorKind;
use crate::metrics::{metric_names, MetricsRegistry};

/// Observable playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing {
        key: SoundKey,
        deadline: Option<Instant>,
    },
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Playing { key, deadline: None } => write!(f, "Playing({key})"),
            PlaybackState::Playing {
                key,
                deadline: Some(_),
            } => write!(f, "Playing({key}, timed)"),
        }
    }
}

/// Read-only view of the active session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub key: SoundKey,
    pub gain: f32,
    pub samples: usize,
    pub sample_rate: u32,
    /// Time left before auto-stop, if armed.
    #[serde(skip)]
    pub deadline: Option<Instant>,
}

/// The one active session. Never leaves the manager.
struct PlaybackSession {
    id: Uuid,
    key: SoundKey,
    buffer: Arc<SampleBuffer>,
    deadline: Option<Instant>,
    generation: u64,
}

struct Inner {
    session: Option<PlaybackSession>,
    gain: f32,
    auto_stop_minutes: u32,
    buffer_seconds: Option<f32>,
}

#[derive(Debug)]
pub enum PlaybackError {
    Synth(SynthError),
    Sink(SinkError),
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::Synth(e) => e.kind(),
            PlaybackError::Sink(e) => e.kind(),
        }
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackError::Synth(e) => write!(f, "synthesis failed: {e}"),
            PlaybackError::Sink(e) => write!(f, "output failed: {e}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

impl From<SynthError> for PlaybackError {
    fn from(e: SynthError) -> Self {
        PlaybackError::Synth(e)
    }
}

impl From<SinkError> for PlaybackError {
    fn from(e: SinkError) -> Self {
        PlaybackError::Sink(e)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    sink: Arc<dyn AudioSink>,
    timers: TaskGeneration,
    state_tx: watch::Sender<PlaybackState>,
    state_rx: watch::Receiver<PlaybackState>,
    metrics: Arc<MetricsRegistry>,
    runtime: Handle,
}

impl Shared {
    /// Release the active session, if any. Caller holds the `inner` lock.
    fn teardown(&self, inner: &mut Inner, reason: &'static str) -> bool {
        let Some(session) = inner.session.take() else {
            return false;
        };
        self.sink.stop();
        self.timers.cancel_all();
        let _ = self.state_tx.send(PlaybackState::Idle);
        info!(
            session = %session.id,
            key = %session.key,
            generation = session.generation,
            reason,
            "playback_stopped"
        );
        true
    }

    /// Deadline elapsed: stop only if the session it was armed for is still active.
    fn expire(&self, guard: &GenerationGuard) {
        let mut inner = self.inner.lock();
        if !guard.should_continue() {
            return;
        }
        let armed_for_active = inner
            .session
            .as_ref()
            .map(|s| s.generation == guard.my_generation())
            .unwrap_or(false);
        if armed_for_active {
            self.metrics.incr(metric_names::AUTO_STOP_FIRED);
            info!(generation = guard.my_generation(), "auto_stop_fired");
            self.teardown(&mut inner, "auto_stop");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.inner.get_mut().session.take().is_some() {
            self.sink.stop();
        }
    }
}

/// Owner of the process-wide playback session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlaybackManager {
    shared: Arc<Shared>,
}

impl PlaybackManager {
    /// `runtime` hosts auto-stop deadline tasks.
    pub fn new(sink: Arc<dyn AudioSink>, runtime: Handle, metrics: Arc<MetricsRegistry>) -> Self {
        let defaults = PlaybackConfig::default();
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    session: None,
                    gain: defaults.gain,
                    auto_stop_minutes: defaults.auto_stop_minutes,
                    buffer_seconds: None,
                }),
                sink,
                timers: TaskGeneration::new(),
                state_tx,
                state_rx,
                metrics,
                runtime,
            }),
        }
    }

    /// Apply stored defaults. Like `set_auto_stop_minutes`, never re-arms a running session.
    pub fn configure(&self, playback: &PlaybackConfig, audio: &AudioConfig) {
        self.set_gain(playback.gain);
        self.set_auto_stop_minutes(playback.auto_stop_minutes);
        self.shared.inner.lock().buffer_seconds = audio.buffer_seconds;
    }

    /// Start `key`, replacing any active session.
    /// An unknown key is reported as `NotFound` and leaves the current session alone.
    pub fn start(&self, key: &str) -> Result<(), PlaybackError> {
        let key: SoundKey = key.parse()?;
        let span = self.shared.metrics.span(metric_names::PLAYBACK_START);
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        shared.teardown(&mut inner, "replaced");

        let profile = key.profile();
        let seconds = inner.buffer_seconds.unwrap_or(profile.default_buffer_seconds);
        let synth_span = shared.metrics.span(metric_names::SYNTHESIZE);
        let buffer = Arc::new(profile.generate(
            &mut StdRng::from_entropy(),
            shared.sink.sample_rate(),
            seconds,
        )?);
        synth_span.finish();

        shared.sink.play(Arc::clone(&buffer), true, inner.gain)?;

        let guard = shared.timers.cancel_and_advance();
        let generation = guard.my_generation();
        let deadline = match inner.auto_stop_minutes {
            0 => None,
            minutes => {
                let deadline = Instant::now() + Duration::from_secs(u64::from(minutes) * 60);
                arm_deadline(&shared.runtime, Arc::downgrade(shared), guard, deadline);
                Some(deadline)
            }
        };

        let session = PlaybackSession {
            id: Uuid::new_v4(),
            key,
            buffer,
            deadline,
            generation,
        };
        info!(
            session = %session.id,
            key = %key,
            gain = inner.gain,
            samples = session.buffer.len(),
            loop_seconds = session.buffer.duration_secs(),
            auto_stop_minutes = inner.auto_stop_minutes,
            generation,
            "playback_started"
        );
        inner.session = Some(session);
        let _ = shared.state_tx.send(PlaybackState::Playing { key, deadline });
        drop(inner);
        span.finish();
        Ok(())
    }

    /// Stop the active session. No-op when idle.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.teardown(&mut inner, "stopped");
    }

    /// Stop `key` if it is the one playing, otherwise start it.
    pub fn toggle(&self, key: &str) -> Result<(), PlaybackError> {
        let key_parsed: SoundKey = key.parse()?;
        {
            let mut inner = self.shared.inner.lock();
            if inner.session.as_ref().map(|s| s.key) == Some(key_parsed) {
                self.shared.teardown(&mut inner, "toggled");
                return Ok(());
            }
        }
        self.start(key)
    }

    /// Clamp to [0, 1]; applies to the live voice and to future starts.
    pub fn set_gain(&self, gain: f32) {
        if gain.is_nan() {
            warn!("ignoring NaN gain");
            return;
        }
        let gain = gain.clamp(0.0, 1.0);
        let mut inner = self.shared.inner.lock();
        inner.gain = gain;
        if inner.session.is_some() {
            self.shared.sink.set_gain(gain);
        }
        info!(gain, live = inner.session.is_some(), "gain_set");
    }

    /// Auto-stop for future starts; 0 disables. A running deadline is left as is.
    pub fn set_auto_stop_minutes(&self, minutes: u32) {
        self.shared.inner.lock().auto_stop_minutes = minutes;
        info!(minutes, "auto_stop_set");
    }

    /// Cancel every pending deadline and stop playback.
    pub fn shutdown(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.teardown(&mut inner, "shutdown");
        self.shared.timers.cancel_all();
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_rx.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.inner.lock().session.is_some()
    }

    pub fn gain(&self) -> f32 {
        self.shared.inner.lock().gain
    }

    pub fn auto_stop_minutes(&self) -> u32 {
        self.shared.inner.lock().auto_stop_minutes
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        let inner = self.shared.inner.lock();
        inner.session.as_ref().map(|s| SessionInfo {
            id: s.id,
            key: s.key,
            gain: inner.gain,
            samples: s.buffer.len(),
            sample_rate: s.buffer.sample_rate(),
            deadline: s.deadline,
        })
    }
}

fn arm_deadline(runtime: &Handle, shared: Weak<Shared>, guard: GenerationGuard, deadline: Instant) {
    let token = guard.token().clone();
    runtime.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep_until(deadline) => {
                if let Some(shared) = shared.upgrade() {
                    shared.expire(&guard);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::{MemorySink, SinkEvent};

    fn manager() -> (PlaybackManager, Arc<MemorySink>, Arc<MetricsRegistry>) {
        let sink = Arc::new(MemorySink::new(8000));
        let metrics = Arc::new(MetricsRegistry::new());
        let mgr = PlaybackManager::new(sink.clone(), Handle::current(), Arc::clone(&metrics));
        (mgr, sink, metrics)
    }

    #[tokio::test]
    async fn start_then_stop() {
        let (mgr, sink, _) = manager();
        mgr.start("rain").unwrap();
        assert!(matches!(
            mgr.state(),
            PlaybackState::Playing { key: SoundKey::Rain, deadline: None }
        ));
        assert_eq!(sink.active_voices(), 1);
        assert_eq!(sink.active_buffer().unwrap().len(), 16000);

        mgr.stop();
        mgr.stop();
        assert_eq!(mgr.state(), PlaybackState::Idle);
        assert_eq!(sink.active_voices(), 0);
    }

    #[tokio::test]
    async fn switching_keeps_one_session() {
        let (mgr, sink, _) = manager();
        mgr.start("rain").unwrap();
        let first = mgr.session_info().unwrap().id;
        mgr.start("ocean").unwrap();
        let info = mgr.session_info().unwrap();
        assert_ne!(info.id, first);
        assert_eq!(info.key, SoundKey::Ocean);
        assert_eq!(sink.active_voices(), 1);
        let events = sink.events();
        assert!(matches!(events[1], SinkEvent::Stop));
        assert!(matches!(events[2], SinkEvent::Play { .. }));
    }

    #[tokio::test]
    async fn unknown_key_leaves_session_untouched() {
        let (mgr, sink, _) = manager();
        mgr.start("fan").unwrap();
        let err = mgr.start("thunder").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(mgr.session_info().unwrap().key, SoundKey::Fan);
        assert_eq!(sink.active_voices(), 1);
    }

    #[tokio::test]
    async fn toggle_stops_same_and_switches_other() {
        let (mgr, _, _) = manager();
        mgr.toggle("shush").unwrap();
        assert!(mgr.is_playing());
        mgr.toggle("womb").unwrap();
        assert_eq!(mgr.session_info().unwrap().key, SoundKey::Womb);
        mgr.toggle("womb").unwrap();
        assert!(!mgr.is_playing());
    }

    #[tokio::test]
    async fn gain_applies_live_and_to_next_start() {
        let (mgr, sink, _) = manager();
        mgr.set_gain(1.7);
        assert_eq!(mgr.gain(), 1.0);
        mgr.start("heartbeat").unwrap();
        assert_eq!(sink.active_gain(), Some(1.0));
        mgr.set_gain(0.25);
        assert_eq!(sink.active_gain(), Some(0.25));
        mgr.set_gain(-3.0);
        assert_eq!(sink.active_gain(), Some(0.0));
        mgr.set_gain(f32::NAN);
        assert_eq!(mgr.gain(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_stop_fires_after_deadline() {
        let (mgr, sink, metrics) = manager();
        mgr.set_auto_stop_minutes(1);
        mgr.start("lullaby").unwrap();
        assert!(mgr.session_info().unwrap().deadline.is_some());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(mgr.is_playing());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!mgr.is_playing());
        assert_eq!(sink.active_voices(), 0);
        assert_eq!(metrics.count(metric_names::AUTO_STOP_FIRED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_session_is_not_stopped_by_old_deadline() {
        let (mgr, _, metrics) = manager();
        mgr.set_auto_stop_minutes(1);
        mgr.start("rain").unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        mgr.set_auto_stop_minutes(0);
        mgr.start("birds").unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(mgr.session_info().unwrap().key, SoundKey::Birds);
        assert_eq!(metrics.count(metric_names::AUTO_STOP_FIRED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn changing_auto_stop_does_not_rearm_running_session() {
        let (mgr, _, _) = manager();
        mgr.start("fan").unwrap();
        mgr.set_auto_stop_minutes(1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(mgr.is_playing());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let (mgr, _, _) = manager();
        let mut rx = mgr.subscribe();
        mgr.start("birds").unwrap();
        rx.changed().await.unwrap();
        assert!(matches!(*rx.borrow(), PlaybackState::Playing { .. }));
        mgr.shutdown();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn configure_sets_buffer_length() {
        let (mgr, sink, _) = manager();
        mgr.configure(
            &PlaybackConfig { gain: 0.4, auto_stop_minutes: 0 },
            &AudioConfig { sample_rate: 8000, buffer_seconds: Some(0.5) },
        );
        mgr.start("white-noise").unwrap();
        assert_eq!(sink.active_buffer().unwrap().len(), 4000);
        assert_eq!(sink.active_gain(), Some(0.4));
    }
}
