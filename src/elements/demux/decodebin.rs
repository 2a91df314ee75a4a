//! Demultiplexer with dynamically discovered output streams.

use crate::element::{
    Element, LifecycleState, PadEmitter, PadTemplate, StateChange, StateTransition,
};
use crate::error::{CreationError, PadError};
use crate::format::Caps;
use crate::pipeline::PadRef;
use crate::pipeline::parser::{PropertyValue, parse_caps};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Name of the dynamic output template.
pub const DEMUX_SRC_TEMPLATE: &str = "src_%u";

/// Drives a [`DecodeBin`] from outside: exposes streams, ends the stream or
/// reports errors, from any thread.
///
/// Cheap to clone. Before the element is connected to a pipeline, exposing a
/// stream fails with [`PadError::Detached`].
#[derive(Clone, Debug, Default)]
pub struct DemuxController {
    emitter: Arc<Mutex<Option<PadEmitter>>>,
}

impl DemuxController {
    /// Create an unattached controller.
    pub fn new() -> Self {
        Self::default()
    }

    fn emitter(&self) -> Option<PadEmitter> {
        self.emitter.lock().clone()
    }

    fn attach(&self, emitter: PadEmitter) {
        *self.emitter.lock() = Some(emitter);
    }

    /// Whether the element has been connected to a pipeline.
    pub fn is_attached(&self) -> bool {
        self.emitter.lock().is_some()
    }

    /// Expose a new stream with the given caps.
    ///
    /// The pipeline's stream handler runs before this returns (in inline
    /// dispatch mode).
    pub fn expose(&self, caps: Caps) -> Result<PadRef, PadError> {
        let emitter = self.emitter().ok_or(PadError::Detached)?;
        emitter.emit(DEMUX_SRC_TEMPLATE, caps)
    }

    /// Signal that no more data will come.
    pub fn finish(&self) -> bool {
        match self.emitter() {
            Some(emitter) => {
                emitter.post_eos();
                true
            }
            None => false,
        }
    }

    /// Report a demuxing error on the bus.
    pub fn fail(&self, code: u32, message: impl Into<String>, debug: Option<String>) -> bool {
        match self.emitter() {
            Some(emitter) => {
                emitter.post_error(code, message, debug);
                true
            }
            None => false,
        }
    }
}

/// Container demultiplexer stand-in.
///
/// Output pads appear at runtime from the `src_%u` template. Streams are
/// exposed either through a [`DemuxController`] or, when the `streams`
/// property is set, by a streaming thread started on the way to `Paused`.
///
/// # Properties
///
/// - `streams`: caps description, one structure per stream
///   (`"audio/x-vorbis; video/x-vp8"`)
/// - `eos`: post end-of-stream after the scripted streams (default `true`)
/// - `interval-ms`: delay before each scripted stream (default `0`)
#[derive(Debug)]
pub struct DecodeBin {
    controller: DemuxController,
    streams: Vec<Caps>,
    eos: bool,
    interval: Duration,
    streaming: Option<Arc<AtomicBool>>,
}

impl DecodeBin {
    /// Create a decodebin with its own controller.
    pub fn new() -> Self {
        Self::with_controller(DemuxController::new())
    }

    /// Create a decodebin driven by an existing controller.
    pub fn with_controller(controller: DemuxController) -> Self {
        Self {
            controller,
            streams: Vec::new(),
            eos: true,
            interval: Duration::ZERO,
            streaming: None,
        }
    }

    /// The controller for this element.
    pub fn controller(&self) -> DemuxController {
        self.controller.clone()
    }

    /// Script streams to expose once the element reaches `Paused`.
    pub fn with_streams(mut self, streams: impl IntoIterator<Item = Caps>) -> Self {
        self.streams = streams.into_iter().collect();
        self
    }

    fn start_streaming(&mut self) {
        if self.streams.is_empty() || self.streaming.is_some() {
            return;
        }
        let running = Arc::new(AtomicBool::new(true));
        self.streaming = Some(Arc::clone(&running));

        let controller = self.controller.clone();
        let streams = self.streams.clone();
        let eos = self.eos;
        let interval = self.interval;

        // The graph is locked while we run; the thread only touches it after
        // this transition returns.
        let spawned = std::thread::Builder::new()
            .name("decodebin-streaming".into())
            .spawn(move || {
                for caps in streams {
                    if !interval.is_zero() {
                        std::thread::sleep(interval);
                    }
                    if !running.load(Ordering::Acquire) {
                        return;
                    }
                    if let Err(e) = controller.expose(caps) {
                        tracing::warn!(error = %e, "decodebin failed to expose stream");
                        controller.fail(1, "failed to expose stream", Some(e.to_string()));
                        return;
                    }
                }
                if eos && running.load(Ordering::Acquire) {
                    controller.finish();
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn decodebin streaming thread");
            self.streaming = None;
        }
    }

    fn stop_streaming(&mut self) {
        if let Some(running) = self.streaming.take() {
            running.store(false, Ordering::Release);
        }
    }
}

impl Default for DecodeBin {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for DecodeBin {
    fn kind(&self) -> &str {
        "decodebin"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![
            PadTemplate::sink(Caps::any()),
            PadTemplate::sometimes_output(DEMUX_SRC_TEMPLATE, Caps::any()),
        ]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        let invalid = |reason: String| CreationError::InvalidProperty {
            kind: "decodebin".into(),
            property: name.to_string(),
            reason,
        };
        match name {
            "streams" => {
                let caps = parse_caps(&value.as_string()).map_err(|e| invalid(e.to_string()))?;
                self.streams = caps
                    .structures()
                    .iter()
                    .cloned()
                    .map(Caps::new)
                    .collect();
                Ok(())
            }
            "eos" => {
                self.eos = value
                    .as_bool()
                    .ok_or_else(|| invalid("expected a boolean".into()))?;
                Ok(())
            }
            "interval-ms" => {
                let ms = value
                    .as_u64()
                    .ok_or_else(|| invalid("expected milliseconds".into()))?;
                self.interval = Duration::from_millis(ms);
                Ok(())
            }
            _ => Err(invalid("no such property".into())),
        }
    }

    fn change_state(&mut self, transition: StateTransition) -> StateChange {
        match (transition.from, transition.to) {
            (LifecycleState::Ready, LifecycleState::Paused) => self.start_streaming(),
            (LifecycleState::Paused, LifecycleState::Ready) => self.stop_streaming(),
            _ => {}
        }
        StateChange::Success
    }

    fn connect_pad_added(&mut self, emitter: PadEmitter) {
        self.controller.attach(emitter);
    }
}

impl Drop for DecodeBin {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}
