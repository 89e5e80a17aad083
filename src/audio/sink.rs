//! Audio sink adapter: where synthesized buffers are sent for rendering.
//! The core only decides what plays and for how long; a sink owns the
//! actual output voice. `MemorySink` records directives for headless use.

use std::sync::Arc;

use parking_lot::Mutex;

use super::SampleBuffer;
use crate::error::ErrorKind;

/// Platform output abstraction. A sink renders at most one voice; `play`
/// replaces whatever it was rendering.
pub trait AudioSink: Send + Sync {
    /// Preferred synthesis rate for buffers sent to this sink.
    fn sample_rate(&self) -> u32;

    /// Start rendering `buffer` at `gain`, looping if `looped`.
    fn play(&self, buffer: Arc<SampleBuffer>, looped: bool, gain: f32) -> Result<(), SinkError>;

    /// Change the gain of the active voice. No-op when nothing is playing.
    fn set_gain(&self, gain: f32);

    /// Release the active voice. No-op when nothing is playing.
    fn stop(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkError {
    NoDevice,
    Stream(String),
}

impl SinkError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Output
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::NoDevice => write!(f, "no audio output device available"),
            SinkError::Stream(msg) => write!(f, "audio stream error: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Directive observed by a `MemorySink`.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Play { samples: usize, looped: bool, gain: f32 },
    SetGain(f32),
    Stop,
}

#[derive(Default)]
struct MemorySinkState {
    active: Option<(Arc<SampleBuffer>, f32)>,
    events: Vec<SinkEvent>,
}

/// In-memory sink: keeps the active voice and a log of every directive.
pub struct MemorySink {
    sample_rate: u32,
    state: Mutex<MemorySinkState>,
}

impl MemorySink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Mutex::new(MemorySinkState::default()),
        }
    }

    /// Number of voices currently rendering (0 or 1).
    pub fn active_voices(&self) -> usize {
        usize::from(self.state.lock().active.is_some())
    }

    pub fn active_gain(&self) -> Option<f32> {
        self.state.lock().active.as_ref().map(|(_, g)| *g)
    }

    pub fn active_buffer(&self) -> Option<Arc<SampleBuffer>> {
        self.state.lock().active.as_ref().map(|(b, _)| Arc::clone(b))
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.state.lock().events.clone()
    }
}

impl AudioSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, buffer: Arc<SampleBuffer>, looped: bool, gain: f32) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        state.events.push(SinkEvent::Play {
            samples: buffer.len(),
            looped,
            gain,
        });
        state.active = Some((buffer, gain));
        Ok(())
    }

    fn set_gain(&self, gain: f32) {
        let mut state = self.state.lock();
        if let Some((_, g)) = state.active.as_mut() {
            *g = gain;
            state.events.push(SinkEvent::SetGain(gain));
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if state.active.take().is_some() {
            state.events.push(SinkEvent::Stop);
        }
    }
}
