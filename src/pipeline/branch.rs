//! Dynamic branch construction for discovered streams.
//!
//! When the demultiplexer exposes a pad, the [`BranchBuilder`] classifies its
//! caps and, for every matched media class, grows one processing chain from
//! that pad to a fresh request pad on the multiplexer:
//!
//! ```text
//! decodebin0:src_0 -> queue0 ! audioconvert0 ! vorbisenc0 ! queue1 -> webmmux0:audio_0
//! ```
//!
//! Each branch is created and linked internally in one graph transaction,
//! synchronized to the pipeline target state while still detached, and then
//! attached in a second transaction. Failures are posted on the bus; nothing
//! is ever thrown back into the emitting streaming thread.

use crate::element::StreamHandler;
use crate::error::{BranchError, LinkError, PadError, ParseError};
use crate::format::Caps;
use crate::observability::{PipelineMetrics, span_branch};
use crate::pipeline::classify::{MediaClass, StreamClassifier};
use crate::pipeline::events::{Bus, BusEvent, ErrorKind, ErrorMessage};
use crate::pipeline::factory::NodeFactory;
use crate::pipeline::graph::{NodeId, PadRef, SharedGraph};
use crate::pipeline::parser::{ParsedChain, ParsedElement, parse_chain};
use crate::pipeline::state::StateSynchronizer;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// A pad exposed by an element at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDiscovered {
    /// The node that exposed the pad.
    pub node: NodeId,
    /// The new pad.
    pub pad: PadRef,
    /// Caps announced for the pad.
    pub caps: Caps,
}

/// How to build the branch for one media class.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRecipe {
    /// Chain from head to tail. Linked `src` to `sink`.
    pub chain: ParsedChain,
    /// Request template on the multiplexer (e.g. `audio_%u`).
    pub mux_template: String,
}

/// Media class to branch recipe mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTable {
    recipes: Vec<(MediaClass, BranchRecipe)>,
}

fn simple_chain(kinds: &[&str]) -> ParsedChain {
    ParsedChain {
        elements: kinds.iter().map(|k| ParsedElement::new(*k)).collect(),
    }
}

impl Default for BranchTable {
    fn default() -> Self {
        Self {
            recipes: vec![
                (
                    MediaClass::Audio,
                    BranchRecipe {
                        chain: simple_chain(&["queue", "audioconvert", "vorbisenc", "queue"]),
                        mux_template: "audio_%u".to_string(),
                    },
                ),
                (
                    MediaClass::Video,
                    BranchRecipe {
                        chain: simple_chain(&["queue", "videoconvert", "vp8enc", "queue"]),
                        mux_template: "video_%u".to_string(),
                    },
                ),
            ],
        }
    }
}

impl BranchTable {
    /// A table with no recipes.
    pub fn empty() -> Self {
        Self {
            recipes: Vec::new(),
        }
    }

    /// Set the recipe for `class` from a chain description.
    pub fn with_branch(
        mut self,
        class: MediaClass,
        chain: &str,
        mux_template: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let recipe = BranchRecipe {
            chain: parse_chain(chain)?,
            mux_template: mux_template.into(),
        };
        match self.recipes.iter_mut().find(|(c, _)| *c == class) {
            Some(slot) => slot.1 = recipe,
            None => self.recipes.push((class, recipe)),
        }
        Ok(self)
    }

    /// The recipe for `class`.
    pub fn recipe(&self, class: MediaClass) -> Option<&BranchRecipe> {
        self.recipes
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, r)| r)
    }
}

/// A branch built and attached to the multiplexer.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedBranch {
    /// Media class of the branch.
    pub class: MediaClass,
    /// Chain nodes from head to tail.
    pub nodes: Vec<NodeId>,
    /// The multiplexer pad the tail feeds.
    pub mux_pad: PadRef,
    /// Whether the discovered pad feeds the chain head. Only one branch per
    /// discovered pad is fed; the others of a multi-class pad stay unfed.
    pub fed: bool,
}

/// Stage a branch failed at, for diagnostics and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Create,
    Sync,
    Attach,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Create => "create",
            Stage::Sync => "sync",
            Stage::Attach => "attach",
        }
    }
}

/// Builds and attaches branches for discovered streams.
///
/// `handle` may be called from any number of streaming threads at once.
#[derive(Debug)]
pub struct BranchBuilder {
    pipeline: String,
    graph: SharedGraph,
    nodes: NodeFactory,
    sync: StateSynchronizer,
    bus: Bus,
    classifier: StreamClassifier,
    table: BranchTable,
    muxer: NodeId,
    metrics: PipelineMetrics,
}

impl BranchBuilder {
    /// Create a builder attaching branches to `muxer`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: impl Into<String>,
        graph: SharedGraph,
        nodes: NodeFactory,
        sync: StateSynchronizer,
        bus: Bus,
        classifier: StreamClassifier,
        table: BranchTable,
        muxer: NodeId,
    ) -> Self {
        let pipeline = pipeline.into();
        let metrics = PipelineMetrics::new(&pipeline);
        Self {
            pipeline,
            graph,
            nodes,
            sync,
            bus,
            classifier,
            table,
            muxer,
            metrics,
        }
    }

    /// React to a discovered stream.
    ///
    /// Returns the branches that were attached. Failures are reported on the
    /// bus and leave the other classes of the same stream unaffected.
    ///
    /// A pad matching several classes gets one branch and one multiplexer pad
    /// per class. The first branch attached takes the discovered pad.
    pub fn handle(&self, msg: StreamDiscovered) -> Vec<LinkedBranch> {
        let source = self.node_name(msg.node);
        let classes = self.classifier.classify(&msg.caps);

        info!(
            pipeline = %self.pipeline,
            pad = %format!("{}:{}", source, msg.pad.name()),
            audio = classes.contains(MediaClass::Audio),
            video = classes.contains(MediaClass::Video),
            "new pad added"
        );

        if classes.is_empty() {
            self.metrics.record_unclassified();
            warn!(caps = %msg.caps, "could not detect media stream type");
            self.bus.post(BusEvent::Error(
                ErrorMessage::new(
                    ErrorKind::StreamClassificationFailed,
                    "could not detect media stream type",
                )
                .with_source(source)
                .with_debug(format!("Received caps: {}", msg.caps)),
            ));
            return Vec::new();
        }

        let mut pad_taken = false;
        let mut linked = Vec::with_capacity(classes.len());
        for class in classes.iter() {
            let _timer = self.metrics.start_branch_timer();
            match self.build_branch(class, &msg, !pad_taken) {
                Ok(branch) => {
                    pad_taken |= branch.fed;
                    linked.push(branch);
                }
                Err((stage, err)) => self.report_failure(class, stage, &source, &err),
            }
        }
        linked
    }

    fn build_branch(
        &self,
        class: MediaClass,
        msg: &StreamDiscovered,
        feed: bool,
    ) -> Result<LinkedBranch, (Stage, BranchError)> {
        let _span = span_branch(&self.pipeline, class.name(), msg.pad.name()).entered();

        let recipe = self
            .table
            .recipe(class)
            .ok_or((Stage::Create, BranchError::NoRecipe { class: class.name() }))?;

        let nodes = self
            .nodes
            .create_chain(&recipe.chain)
            .map_err(|e| (Stage::Create, e))?;
        debug!(class = %class, count = nodes.len(), "branch chain created");

        for node in &nodes {
            self.sync
                .sync_to_parent(*node)
                .map_err(|e| (Stage::Sync, BranchError::from(e)))?;
        }

        let (head, tail) = match (nodes.first(), nodes.last()) {
            (Some(h), Some(t)) => (*h, *t),
            _ => {
                return Err((
                    Stage::Create,
                    BranchError::NoRecipe { class: class.name() },
                ));
            }
        };

        let mux_pad = self
            .attach(&msg.pad, head, tail, &recipe.mux_template, feed)
            .map_err(|e| (Stage::Attach, e))?;

        let head_name = self.node_name(head);
        info!(
            class = %class,
            head = %head_name,
            mux_pad = %mux_pad.name(),
            fed = feed,
            "branch linked"
        );
        if !feed {
            let pad = format!("{}:{}", self.node_name(msg.node), msg.pad.name());
            warn!(class = %class, pad = %pad, "discovered pad already feeds another branch");
            self.bus.post(BusEvent::Warning(
                ErrorMessage::new(
                    ErrorKind::BranchConstructionFailed,
                    format!("{} branch has no input", class),
                )
                .with_source(self.node_name(msg.node))
                .with_debug(format!("{} already feeds another branch", pad)),
            ));
        }
        self.metrics.record_branch_built(class.name());
        self.bus.post(BusEvent::BranchLinked {
            class,
            head: head_name,
            mux_pad: mux_pad.name().to_string(),
        });

        Ok(LinkedBranch {
            class,
            nodes,
            mux_pad,
            fed: feed,
        })
    }

    /// Request the multiplexer pad and make the attaching links in one
    /// transaction. The links are validated before the pad is requested.
    /// Without `feed` the chain head is left unlinked.
    fn attach(
        &self,
        discovered: &PadRef,
        head: NodeId,
        tail: NodeId,
        mux_template: &str,
        feed: bool,
    ) -> Result<PadRef, BranchError> {
        let head_sink = PadRef::new(head, "sink");
        let tail_src = PadRef::new(tail, "src");

        self.graph.transaction(|g| -> Result<PadRef, BranchError> {
            let mux_name = g
                .node(self.muxer)
                .map(|n| n.name().to_string())
                .ok_or(PadError::NoSuchNode {
                    index: self.muxer.index(),
                })?;
            let template_caps = g
                .request_template(self.muxer, mux_template)
                .map(|t| t.caps.clone())
                .ok_or_else(|| PadError::NoSuchTemplate {
                    node: mux_name.clone(),
                    template: mux_template.to_string(),
                })?;

            if feed {
                g.check_link(discovered, &head_sink)?;
            }

            let tail_node = g.node(tail).map(|n| n.name().to_string()).unwrap_or_default();
            let tail_pad = g.pad(&tail_src).ok_or_else(|| LinkError::NoSuchPad {
                node: tail_node.clone(),
                pad: "src".into(),
            })?;
            if tail_pad.is_linked() {
                return Err(LinkError::PadAlreadyLinked {
                    node: tail_node,
                    pad: "src".into(),
                }
                .into());
            }
            if !tail_pad.caps().intersects(&template_caps) {
                return Err(LinkError::IncompatibleCapabilities {
                    src: tail_pad.caps().to_string(),
                    sink: template_caps.to_string(),
                }
                .into());
            }

            let mux_pad = g.request_pad(self.muxer, mux_template)?;
            g.link(&tail_src, &mux_pad)?;
            if feed {
                g.link(discovered, &head_sink)?;
            }
            Ok(mux_pad)
        })
    }

    fn report_failure(&self, class: MediaClass, stage: Stage, source: &str, err: &BranchError) {
        self.metrics.record_branch_failure(class.name(), stage.label());
        let (kind, message) = match stage {
            Stage::Sync => (
                ErrorKind::StateTransitionRejected,
                format!("{} branch could not reach the pipeline state", class),
            ),
            Stage::Create => (
                ErrorKind::BranchConstructionFailed,
                format!("failed to build {} branch", class),
            ),
            Stage::Attach => (
                ErrorKind::BranchConstructionFailed,
                format!("failed to link {} branch", class),
            ),
        };
        warn!(class = %class, stage = stage.label(), error = %err, "{}", message);
        self.bus.post(BusEvent::Error(
            ErrorMessage::new(kind, message)
                .with_source(source)
                .with_debug(err.to_string()),
        ));
    }

    fn node_name(&self, node: NodeId) -> String {
        self.graph
            .read(|g| g.node(node).map(|n| n.name().to_string()))
            .unwrap_or_else(|| format!("node{}", node.index()))
    }
}

/// Where discovered streams are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryDispatch {
    /// On the emitting streaming thread.
    #[default]
    Inline,
    /// On a dedicated builder thread fed through a queue.
    Worker,
}

/// Builder thread of [`DiscoveryDispatch::Worker`] mode.
struct Worker {
    tx: kanal::Sender<StreamDiscovered>,
    rx: kanal::Receiver<StreamDiscovered>,
    // Set once shutdown starts; handlers send only while holding it unset.
    stopped: Arc<Mutex<bool>>,
    thread: JoinHandle<()>,
}

/// Owns the builder thread in [`DiscoveryDispatch::Worker`] mode.
#[derive(Default)]
pub struct Dispatcher {
    worker: Option<Worker>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Create the stream handler for `builder` in the given mode.
    ///
    /// The handler only holds a weak reference: once the builder is dropped,
    /// later discoveries are ignored.
    pub fn start(
        builder: &Arc<BranchBuilder>,
        mode: DiscoveryDispatch,
    ) -> std::io::Result<(StreamHandler, Dispatcher)> {
        let weak: Weak<BranchBuilder> = Arc::downgrade(builder);
        match mode {
            DiscoveryDispatch::Inline => {
                let handler: StreamHandler = Arc::new(move |msg| match weak.upgrade() {
                    Some(builder) => {
                        builder.handle(msg);
                    }
                    None => debug!("stream discovered after pipeline shutdown"),
                });
                Ok((handler, Dispatcher::default()))
            }
            DiscoveryDispatch::Worker => {
                let (tx, rx) = kanal::unbounded::<StreamDiscovered>();
                let worker_rx = rx.clone();
                let thread = std::thread::Builder::new()
                    .name("padweave-branch".into())
                    .spawn(move || {
                        let rx = worker_rx;
                        while let Ok(msg) = rx.recv() {
                            let Some(builder) = weak.upgrade() else {
                                break;
                            };
                            builder.handle(msg);
                        }
                        debug!("branch worker exiting");
                    })?;

                let stopped = Arc::new(Mutex::new(false));
                let sender = tx.clone();
                let gate = Arc::clone(&stopped);
                let handler: StreamHandler = Arc::new(move |msg| {
                    let stopped = gate.lock();
                    if *stopped {
                        warn!(
                            pad = %msg.pad.name(),
                            "stream discovered after pipeline shutdown, dropped"
                        );
                    } else if let Err(e) = sender.send(msg) {
                        warn!(error = %e, "branch worker queue closed, stream dropped");
                    }
                });
                Ok((
                    handler,
                    Dispatcher {
                        worker: Some(Worker {
                            tx,
                            rx,
                            stopped,
                            thread,
                        }),
                    },
                ))
            }
        }
    }

    /// Stop the builder thread, if any, and wait for it.
    ///
    /// Discoveries still queued are dropped, each with a warning. Returns the
    /// number dropped.
    pub fn shutdown(&mut self) -> usize {
        let Some(worker) = self.worker.take() else {
            return 0;
        };

        let mut dropped = 0;
        {
            let mut stopped = worker.stopped.lock();
            *stopped = true;
            while let Ok(Some(msg)) = worker.rx.try_recv() {
                warn!(
                    pad = %msg.pad.name(),
                    caps = %msg.caps,
                    "pipeline shutting down, discovered stream dropped"
                );
                dropped += 1;
            }
            let _ = worker.tx.close();
        }

        if worker.thread.join().is_err() {
            warn!("branch worker panicked");
        }
        dropped
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            *worker.stopped.lock() = true;
            let _ = worker.tx.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, PadTemplate, StateChange, StateTransition};
    use crate::pipeline::events::BusWatch;
    use crate::pipeline::factory::ElementFactory;

    struct Demux;

    impl Element for Demux {
        fn kind(&self) -> &str {
            "demux"
        }

        fn pad_templates(&self) -> Vec<PadTemplate> {
            vec![
                PadTemplate::sink(Caps::any()),
                PadTemplate::sometimes_output("src_%u", Caps::any()),
            ]
        }

        fn change_state(&mut self, _transition: StateTransition) -> StateChange {
            StateChange::Success
        }
    }

    struct Fixture {
        graph: SharedGraph,
        builder: BranchBuilder,
        watch: BusWatch,
        demux: NodeId,
        mux: NodeId,
    }

    fn fixture(table: BranchTable) -> Fixture {
        let graph = SharedGraph::new();
        let (bus, watch) = Bus::channel();
        let nodes = NodeFactory::new(Arc::new(ElementFactory::new()), graph.clone());
        let demux = graph.add_node(Box::new(Demux));
        let mux = nodes.create("webmmux").unwrap();
        let sync = StateSynchronizer::new(graph.clone(), bus.clone());
        let builder = BranchBuilder::new(
            "test",
            graph.clone(),
            nodes,
            sync,
            bus,
            StreamClassifier::new(),
            table,
            mux,
        );
        Fixture {
            graph,
            builder,
            watch,
            demux,
            mux,
        }
    }

    fn discover(f: &Fixture, caps: &str) -> StreamDiscovered {
        let caps: Caps = caps.parse().unwrap();
        let pad = f
            .graph
            .add_dynamic_pad(f.demux, "src_%u", caps.clone())
            .unwrap();
        StreamDiscovered {
            node: f.demux,
            pad,
            caps,
        }
    }

    fn errors(watch: &mut BusWatch) -> Vec<ErrorMessage> {
        watch
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                BusEvent::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_audio_branch() {
        let mut f = fixture(BranchTable::default());
        let msg = discover(&f, "audio/x-vorbis");

        let branches = f.builder.handle(msg.clone());
        assert_eq!(branches.len(), 1);
        let branch = &branches[0];
        assert_eq!(branch.class, MediaClass::Audio);
        assert_eq!(branch.nodes.len(), 4);
        assert_eq!(branch.mux_pad.name(), "audio_0");
        assert_eq!(branch.mux_pad.node(), f.mux);

        f.graph.read(|g| {
            assert_eq!(g.peer(&msg.pad), Some(&PadRef::new(branch.nodes[0], "sink")));
            assert_eq!(
                g.peer(&branch.mux_pad),
                Some(&PadRef::new(branch.nodes[3], "src"))
            );
            // demux + mux + 4 chain nodes
            assert_eq!(g.node_count(), 6);
        });
        assert!(errors(&mut f.watch).is_empty());
    }

    #[test]
    fn test_unclassified_posts_one_error_and_adds_nothing() {
        let mut f = fixture(BranchTable::default());
        let msg = discover(&f, "text/x-subtitle");

        assert!(f.builder.handle(msg).is_empty());
        let errors = errors(&mut f.watch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::StreamClassificationFailed);
        assert_eq!(errors[0].message, "could not detect media stream type");
        assert_eq!(
            errors[0].debug.as_deref(),
            Some("Received caps: text/x-subtitle")
        );
        assert_eq!(errors[0].source.as_deref(), Some("demux0"));
        assert_eq!(f.graph.node_count(), 2);
    }

    #[test]
    fn test_same_class_gets_independent_branches() {
        let f = fixture(BranchTable::default());
        let a = f.builder.handle(discover(&f, "audio/x-vorbis"));
        let b = f.builder.handle(discover(&f, "audio/x-opus"));

        assert_eq!(a[0].mux_pad.name(), "audio_0");
        assert_eq!(b[0].mux_pad.name(), "audio_1");
        assert!(a[0].nodes.iter().all(|n| !b[0].nodes.contains(n)));
    }

    #[test]
    fn test_multi_class_pad_gets_pad_per_class() {
        let mut f = fixture(BranchTable::default());
        let msg = discover(&f, "audio/x-vorbis; video/x-vp8");

        let branches = f.builder.handle(msg.clone());
        assert_eq!(branches.len(), 2);
        let (audio, video) = (&branches[0], &branches[1]);
        assert_eq!(audio.class, MediaClass::Audio);
        assert_eq!(video.class, MediaClass::Video);
        assert!(audio.fed);
        assert!(!video.fed);
        assert_eq!(audio.mux_pad.name(), "audio_0");
        assert_eq!(video.mux_pad.name(), "video_0");

        f.graph.read(|g| {
            assert_eq!(g.peer(&msg.pad), Some(&PadRef::new(audio.nodes[0], "sink")));
            assert!(g.peer(&PadRef::new(video.nodes[0], "sink")).is_none());
            for branch in &branches {
                assert_eq!(
                    g.peer(&branch.mux_pad),
                    Some(&PadRef::new(branch.nodes[3], "src"))
                );
            }
            assert_eq!(g.node_count(), 10);
            // 3 internal links per chain, 2 attaching links for audio, 1 for video.
            assert_eq!(g.link_count(), 9);
        });

        let events = f.watch.drain();
        assert!(!events.iter().any(|e| matches!(e, BusEvent::Error(_))));
        let warnings: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Warning(msg) => Some(msg),
                _ => None,
            })
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("video"));
        assert_eq!(
            warnings[0].debug.as_deref(),
            Some("demux0:src_0 already feeds another branch")
        );
    }

    #[test]
    fn test_unknown_kind_reports_construction_failure() {
        let table = BranchTable::default()
            .with_branch(MediaClass::Video, "queue ! nosuchenc ! queue", "video_%u")
            .unwrap();
        let mut f = fixture(table);

        assert!(f.builder.handle(discover(&f, "video/x-vp8")).is_empty());
        let errors = errors(&mut f.watch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::BranchConstructionFailed);
        assert!(errors[0].message.contains("video"));
        assert_eq!(f.graph.node_count(), 2);
    }

    #[test]
    fn test_attach_failure_leaves_no_request_pad() {
        // vorbis output cannot feed a video request pad.
        let table = BranchTable::default()
            .with_branch(MediaClass::Audio, "queue ! audioconvert ! vorbisenc", "video_%u")
            .unwrap();
        let mut f = fixture(table);

        let msg = discover(&f, "audio/x-vorbis");
        assert!(f.builder.handle(msg.clone()).is_empty());

        let errors = errors(&mut f.watch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::BranchConstructionFailed);
        f.graph.read(|g| {
            let mux = g.node(f.mux).unwrap();
            assert!(mux.pads().iter().all(|p| p.name() == "src"));
            assert!(g.peer(&msg.pad).is_none());
            // The detached chain stays in the graph.
            assert_eq!(g.node_count(), 5);
        });
    }

    #[test]
    fn test_branch_nodes_follow_target_state() {
        use crate::element::LifecycleState;

        let f = fixture(BranchTable::default());
        f.graph.transaction(|g| g.set_target(LifecycleState::Paused));

        let branches = f.builder.handle(discover(&f, "video/x-vp8"));
        f.graph.read(|g| {
            for node in &branches[0].nodes {
                assert_eq!(g.node(*node).unwrap().state(), LifecycleState::Paused);
            }
        });
    }

    #[test]
    fn test_worker_dispatch() {
        let f = fixture(BranchTable::default());
        let builder = Arc::new(f.builder);
        let (handler, mut dispatcher) =
            Dispatcher::start(&builder, DiscoveryDispatch::Worker).unwrap();

        let caps = Caps::simple("audio/x-vorbis");
        let pad = f
            .graph
            .add_dynamic_pad(f.demux, "src_%u", caps.clone())
            .unwrap();
        handler(StreamDiscovered {
            node: f.demux,
            pad: pad.clone(),
            caps,
        });

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while f.graph.read(|g| g.peer(&pad).is_none()) {
            assert!(std::time::Instant::now() < deadline, "branch never linked");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(dispatcher.shutdown(), 0);
    }

    #[test]
    fn test_worker_shutdown_drops_queued_discoveries() {
        let f = fixture(BranchTable::default());
        let builder = Arc::new(f.builder);
        let (handler, mut dispatcher) =
            Dispatcher::start(&builder, DiscoveryDispatch::Worker).unwrap();
        // Without a builder the worker exits after taking one message.
        drop(builder);

        let pads: Vec<PadRef> = (0..3)
            .map(|_| {
                f.graph
                    .add_dynamic_pad(f.demux, "src_%u", Caps::simple("audio/x-vorbis"))
                    .unwrap()
            })
            .collect();
        for pad in &pads {
            handler(StreamDiscovered {
                node: f.demux,
                pad: pad.clone(),
                caps: Caps::simple("audio/x-vorbis"),
            });
        }

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while dispatcher.worker.as_ref().unwrap().rx.len() != 2 {
            assert!(std::time::Instant::now() < deadline, "worker never took a message");
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(dispatcher.shutdown(), 2);

        // Later discoveries are refused without reaching the queue.
        handler(StreamDiscovered {
            node: f.demux,
            pad: pads[0].clone(),
            caps: Caps::simple("audio/x-vorbis"),
        });
        assert_eq!(dispatcher.shutdown(), 0);
        assert!(pads.iter().all(|p| f.graph.read(|g| g.peer(p).is_none())));
    }
}
