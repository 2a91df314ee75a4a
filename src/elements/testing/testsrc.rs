//! Audio test source for static pipelines and tests.

use crate::element::{
    Element, LifecycleState, PadEmitter, PadTemplate, StateChange, StateTransition,
};
use crate::error::CreationError;
use crate::format::{Caps, CapsStructure};
use crate::pipeline::PropertyValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Waveform generated by [`AudioTestSrc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wave {
    /// Sine wave (default).
    #[default]
    Sine,
    /// Square wave.
    Square,
    /// Digital silence.
    Silence,
    /// White noise.
    WhiteNoise,
}

impl Wave {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" | "0" => Some(Self::Sine),
            "square" | "1" => Some(Self::Square),
            "silence" | "4" => Some(Self::Silence),
            "white-noise" | "5" => Some(Self::WhiteNoise),
            _ => None,
        }
    }
}

/// Raw audio source.
///
/// With `num-buffers` set, the source posts end-of-stream once that many
/// buffers worth of time has elapsed in `Playing`. Leaving `Playing` early
/// suppresses it.
///
/// # Properties
///
/// - `num-buffers`: buffers before EOS (`-1`, the default, runs forever)
/// - `samplesperbuffer`: samples per buffer (default 1024)
/// - `rate`: sample rate (default 44100)
/// - `wave`: `sine`, `square`, `silence` or `white-noise`
#[derive(Debug)]
pub struct AudioTestSrc {
    num_buffers: Option<u64>,
    samples_per_buffer: u64,
    rate: u64,
    wave: Wave,
    emitter: Option<PadEmitter>,
    running: Option<Arc<AtomicBool>>,
}

impl AudioTestSrc {
    /// Create an endless sine source.
    pub fn new() -> Self {
        Self {
            num_buffers: None,
            samples_per_buffer: 1024,
            rate: 44_100,
            wave: Wave::Sine,
            emitter: None,
            running: None,
        }
    }

    /// Configured waveform.
    pub fn wave(&self) -> Wave {
        self.wave
    }

    /// Time covered by the configured number of buffers, if bounded.
    pub fn stream_duration(&self) -> Option<Duration> {
        let buffers = self.num_buffers?;
        let samples = buffers.saturating_mul(self.samples_per_buffer);
        Some(Duration::from_secs_f64(samples as f64 / self.rate as f64))
    }

    fn start(&mut self) {
        let (Some(duration), Some(emitter)) = (self.stream_duration(), self.emitter.clone())
        else {
            return;
        };
        let running = Arc::new(AtomicBool::new(true));
        self.running = Some(Arc::clone(&running));

        let spawned = std::thread::Builder::new()
            .name("audiotestsrc".into())
            .spawn(move || {
                std::thread::sleep(duration);
                if running.load(Ordering::Acquire) {
                    emitter.post_eos();
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn audiotestsrc thread");
            self.running = None;
        }
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::Release);
        }
    }
}

impl Default for AudioTestSrc {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for AudioTestSrc {
    fn kind(&self) -> &str {
        "audiotestsrc"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        let caps = Caps::new(
            CapsStructure::new("audio/x-raw").with_field("rate", self.rate.to_string()),
        );
        vec![PadTemplate::src(caps)]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        let invalid = |reason: String| CreationError::InvalidProperty {
            kind: "audiotestsrc".into(),
            property: name.to_string(),
            reason,
        };
        match name {
            "num-buffers" => match value.as_i64() {
                Some(-1) => self.num_buffers = None,
                Some(n) if n >= 0 => self.num_buffers = Some(n as u64),
                _ => return Err(invalid("expected -1 or a buffer count".into())),
            },
            "samplesperbuffer" => {
                self.samples_per_buffer = value
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("expected a positive count".into()))?;
            }
            "rate" => {
                self.rate = value
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("expected a positive rate".into()))?;
            }
            "wave" => {
                self.wave = Wave::from_name(&value.as_string())
                    .ok_or_else(|| invalid(format!("unknown wave '{}'", value.as_string())))?;
            }
            _ => return Err(invalid("no such property".into())),
        }
        Ok(())
    }

    fn change_state(&mut self, transition: StateTransition) -> StateChange {
        match (transition.from, transition.to) {
            (LifecycleState::Paused, LifecycleState::Playing) => self.start(),
            (LifecycleState::Playing, LifecycleState::Paused) => self.stop(),
            _ => {}
        }
        StateChange::Success
    }

    fn connect_pad_added(&mut self, emitter: PadEmitter) {
        self.emitter = Some(emitter);
    }
}

impl Drop for AudioTestSrc {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_duration() {
        let mut src = AudioTestSrc::new();
        assert_eq!(src.stream_duration(), None);

        src.set_property("num-buffers", &PropertyValue::Integer(10))
            .unwrap();
        src.set_property("samplesperbuffer", &PropertyValue::Integer(4410))
            .unwrap();
        assert_eq!(src.stream_duration(), Some(Duration::from_secs(1)));

        src.set_property("num-buffers", &PropertyValue::Integer(-1))
            .unwrap();
        assert_eq!(src.stream_duration(), None);
    }

    #[test]
    fn test_wave_property() {
        let mut src = AudioTestSrc::new();
        src.set_property("wave", &PropertyValue::from("square")).unwrap();
        assert_eq!(src.wave(), Wave::Square);
        assert!(src.set_property("wave", &PropertyValue::from("saw")).is_err());
        assert!(src.set_property("num-buffers", &PropertyValue::Integer(-5)).is_err());
    }

    #[test]
    fn test_src_caps_carry_rate() {
        let src = AudioTestSrc::new();
        let caps = &src.pad_templates()[0].caps;
        assert_eq!(caps.to_string(), "audio/x-raw, rate=44100");
        assert!(caps.intersects(&Caps::simple("audio/x-raw")));
    }
}
