//! cpal-backed output sink.
//! The cpal stream is not `Send` on every platform, so it lives on a
//! dedicated `audio-output` thread for the sink's whole lifetime; the
//! callback reads the active voice from shared state.

use std::sync::Arc;

use crossbeam_channel as cb;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::sink::{AudioSink, SinkError};
use super::SampleBuffer;

/// Playback cursor over one buffer, with linear rate conversion.
struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: f64,
    /// Buffer samples advanced per device frame.
    step: f64,
    looped: bool,
    gain: f32,
}

impl Voice {
    fn new(buffer: Arc<SampleBuffer>, device_rate: u32, looped: bool, gain: f32) -> Self {
        let step = buffer.sample_rate() as f64 / device_rate.max(1) as f64;
        Self { buffer, pos: 0.0, step, looped, gain }
    }

    /// Next output sample, or `None` once a one-shot voice has run out.
    #[inline]
    fn next_sample(&mut self) -> Option<f32> {
        let samples = self.buffer.samples();
        let len = samples.len();
        if len == 0 {
            return None;
        }
        if self.pos >= len as f64 {
            if !self.looped {
                return None;
            }
            self.pos %= len as f64;
        }
        let idx = self.pos as usize;
        let frac = (self.pos - idx as f64) as f32;
        let a = samples[idx];
        let b = if idx + 1 < len {
            samples[idx + 1]
        } else if self.looped {
            samples[0]
        } else {
            0.0
        };
        self.pos += self.step;
        Some((a + (b - a) * frac) * self.gain)
    }
}

type SharedVoice = Arc<Mutex<Option<Voice>>>;

/// Sink rendering to the default output device.
pub struct CpalSink {
    voice: SharedVoice,
    device_rate: u32,
    shutdown_tx: cb::Sender<()>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device and start a (silent) stream.
    pub fn open_default() -> Result<Self, SinkError> {
        let voice: SharedVoice = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = cb::bounded::<Result<u32, SinkError>>(1);
        let (shutdown_tx, shutdown_rx) = cb::bounded::<()>(1);

        let voice_thread = Arc::clone(&voice);
        let thread = std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let stream = match build_output_stream(voice_thread) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the sink is dropped; dropping the stream closes the device.
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("audio output stream closed");
            })
            .map_err(|e| SinkError::Stream(format!("failed to spawn audio output thread: {e}")))?;

        let device_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(SinkError::Stream("audio output thread exited during startup".into()));
            }
        };

        Ok(Self {
            voice,
            device_rate,
            shutdown_tx,
            thread: Some(thread),
        })
    }
}

fn build_output_stream(voice: SharedVoice) -> Result<(cpal::Stream, u32), SinkError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(SinkError::NoDevice)?;
    let supported = device
        .default_output_config()
        .map_err(|e| SinkError::Stream(format!("no default output config: {e}")))?;
    let config: cpal::StreamConfig = supported.config();
    let channels = usize::from(config.channels.max(1));
    let rate = config.sample_rate.0;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut guard = voice.lock();
                for frame in data.chunks_mut(channels) {
                    let sample = match guard.as_mut().and_then(Voice::next_sample) {
                        Some(s) => s,
                        None => {
                            *guard = None;
                            0.0
                        }
                    };
                    frame.fill(sample);
                }
            },
            |err| {
                error!(error = %err, "audio output error");
            },
            None,
        )
        .map_err(|e| SinkError::Stream(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| SinkError::Stream(format!("failed to start output stream: {e}")))?;
    info!(sample_rate = rate, channels, "audio output stream started");
    Ok((stream, rate))
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.device_rate
    }

    fn play(&self, buffer: Arc<SampleBuffer>, looped: bool, gain: f32) -> Result<(), SinkError> {
        if buffer.sample_rate() != self.device_rate {
            warn!(
                buffer_rate = buffer.sample_rate(),
                device_rate = self.device_rate,
                "rate mismatch, converting on the fly"
            );
        }
        *self.voice.lock() = Some(Voice::new(buffer, self.device_rate, looped, gain));
        Ok(())
    }

    fn set_gain(&self, gain: f32) {
        if let Some(v) = self.voice.lock().as_mut() {
            v.gain = gain;
        }
    }

    fn stop(&self) {
        self.voice.lock().take();
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_loops_at_matching_rate() {
        let buf = Arc::new(SampleBuffer::new(vec![0.1, 0.2, 0.3], 8000));
        let mut v = Voice::new(buf, 8000, true, 1.0);
        let out: Vec<f32> = (0..6).map(|_| v.next_sample().unwrap()).collect();
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn one_shot_voice_runs_out() {
        let buf = Arc::new(SampleBuffer::new(vec![0.5, 0.5], 8000));
        let mut v = Voice::new(buf, 8000, false, 0.5);
        assert_eq!(v.next_sample(), Some(0.25));
        assert!(v.next_sample().is_some());
        assert_eq!(v.next_sample(), None);
    }

    #[test]
    fn voice_interpolates_when_upsampling() {
        let buf = Arc::new(SampleBuffer::new(vec![0.0, 1.0], 4000));
        let mut v = Voice::new(buf, 8000, true, 1.0);
        let out: Vec<f32> = (0..4).map(|_| v.next_sample().unwrap()).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.5]);
    }
}
