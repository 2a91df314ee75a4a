//! The pipeline supervisor: skeleton construction and run-to-completion.
//!
//! ```text
//! filesrc0 -> decodebin0 ~~(src_%u, discovered)~~> [branches] -> webmmux0 -> filesink0
//! ```
//!
//! The supervisor builds the static skeleton, registers the branch builder
//! as the demultiplexer's stream handler, then drives the pipeline to
//! `Playing` and watches the bus until end of stream, a fatal error, or
//! cancellation.

use crate::element::{LifecycleState, StreamHandler};
use crate::error::{BuildError, RunError, StateError};
use crate::observability::{init_metrics, instrument_pipeline, span_pipeline};
use crate::pipeline::branch::{BranchBuilder, BranchTable, Dispatcher, DiscoveryDispatch};
use crate::pipeline::bus_supervisor::{
    BusSupervisor, FailurePolicy, SupervisorState, TerminationReason,
};
use crate::pipeline::classify::StreamClassifier;
use crate::pipeline::events::{Bus, ErrorMessage};
use crate::pipeline::factory::{ElementFactory, NodeFactory};
use crate::pipeline::graph::{NodeId, PadRef, SharedGraph};
use crate::pipeline::parser::{ParsedElement, PropertyValue, parse_chain};
use crate::pipeline::state::{DEFAULT_STATE_TIMEOUT, StateSynchronizer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// The four fixed elements of a remux pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonConfig {
    /// Reads the input container.
    pub source: ParsedElement,
    /// Exposes one dynamic pad per elementary stream.
    pub demuxer: ParsedElement,
    /// Collects the encoded branches through request pads.
    pub muxer: ParsedElement,
    /// Writes the output container.
    pub sink: ParsedElement,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            source: ParsedElement::new("filesrc"),
            demuxer: ParsedElement::new("decodebin"),
            muxer: ParsedElement::new("webmmux"),
            sink: ParsedElement::new("filesink"),
        }
    }
}

impl SkeletonConfig {
    /// Build a skeleton from four single-element descriptions, such as
    /// `"filesrc"` or `"decodebin streams=\"audio/x-vorbis\""`.
    pub fn from_descriptions(
        source: &str,
        demuxer: &str,
        muxer: &str,
        sink: &str,
    ) -> Result<Self, BuildError> {
        Ok(Self {
            source: single(source)?,
            demuxer: single(demuxer)?,
            muxer: single(muxer)?,
            sink: single(sink)?,
        })
    }

    fn elements(&self) -> [&ParsedElement; 4] {
        [&self.source, &self.demuxer, &self.muxer, &self.sink]
    }
}

fn single(description: &str) -> Result<ParsedElement, BuildError> {
    let mut chain = parse_chain(description)?;
    match chain.elements.len() {
        1 => Ok(chain.elements.remove(0)),
        count => Err(BuildError::TooShort { count }),
    }
}

/// Configuration for a [`PipelineSupervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Pipeline name, used in logs, spans and metrics labels.
    pub name: String,
    /// The fixed elements.
    pub skeleton: SkeletonConfig,
    /// `location` for the source, if any.
    pub source_location: Option<String>,
    /// `location` for the sink, if any.
    pub sink_location: Option<String>,
    /// Chain built for each media class.
    pub branches: BranchTable,
    /// Caps to media class mapping.
    pub classifier: StreamClassifier,
    /// How branch-level errors affect the run.
    pub failure_policy: FailurePolicy,
    /// Where discovered streams are handled.
    pub dispatch: DiscoveryDispatch,
    /// Bound on asynchronous state changes.
    pub state_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            name: "pipeline0".to_string(),
            skeleton: SkeletonConfig::default(),
            source_location: None,
            sink_location: None,
            branches: BranchTable::default(),
            classifier: StreamClassifier::default(),
            failure_policy: FailurePolicy::Abort,
            dispatch: DiscoveryDispatch::Inline,
            state_timeout: DEFAULT_STATE_TIMEOUT,
        }
    }
}

impl SupervisorConfig {
    /// Default configuration remuxing `source` into `sink`.
    pub fn remux(source: impl Into<String>, sink: impl Into<String>) -> Self {
        Self::default().with_locations(source, sink)
    }

    /// Set the pipeline name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the skeleton elements.
    pub fn with_skeleton(mut self, skeleton: SkeletonConfig) -> Self {
        self.skeleton = skeleton;
        self
    }

    /// Set input and output locations.
    pub fn with_locations(mut self, source: impl Into<String>, sink: impl Into<String>) -> Self {
        self.source_location = Some(source.into());
        self.sink_location = Some(sink.into());
        self
    }

    /// Replace the branch table.
    pub fn with_branches(mut self, branches: BranchTable) -> Self {
        self.branches = branches;
        self
    }

    /// Replace the classifier.
    pub fn with_classifier(mut self, classifier: StreamClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the discovery dispatch mode.
    pub fn with_dispatch(mut self, dispatch: DiscoveryDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the asynchronous state change bound.
    pub fn with_state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }
}

/// Fixed nodes of a remux skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skeleton {
    /// Source node.
    pub source: NodeId,
    /// Demultiplexer node.
    pub demuxer: NodeId,
    /// Multiplexer node.
    pub muxer: NodeId,
    /// Sink node.
    pub sink: NodeId,
}

/// Owns a pipeline and runs it to completion.
#[derive(Debug)]
pub struct PipelineSupervisor {
    name: String,
    graph: SharedGraph,
    bus: Bus,
    cancel: CancellationToken,
    sync: StateSynchronizer,
    bus_supervisor: BusSupervisor,
    // Keeps the branch builder alive; stream handlers only hold weak refs.
    builder: Option<Arc<BranchBuilder>>,
    dispatcher: Dispatcher,
    skeleton: Option<Skeleton>,
}

impl PipelineSupervisor {
    /// Build the remux skeleton and register the branch builder.
    ///
    /// Nothing is started; see [`run`](Self::run).
    pub fn build(config: SupervisorConfig, factory: Arc<ElementFactory>) -> Result<Self, BuildError> {
        init_metrics();
        let _span = instrument_pipeline(&config.name);

        let graph = SharedGraph::new();
        let (bus, watch) = Bus::channel();
        let nodes = NodeFactory::new(factory, graph.clone());

        let mut parsed: Vec<ParsedElement> =
            config.skeleton.elements().into_iter().cloned().collect();
        if let Some(location) = &config.source_location {
            parsed[0] = with_location(&parsed[0], location);
        }
        if let Some(location) = &config.sink_location {
            parsed[3] = with_location(&parsed[3], location);
        }

        let ids = nodes.create_parsed(&parsed)?;
        let [source, demuxer, muxer, sink] = ids[..] else {
            return Err(BuildError::TooShort { count: ids.len() });
        };

        graph.transaction(|g| -> Result<(), BuildError> {
            g.link(&PadRef::new(source, "src"), &PadRef::new(demuxer, "sink"))?;
            g.link(&PadRef::new(muxer, "src"), &PadRef::new(sink, "sink"))?;
            Ok(())
        })?;

        let sync =
            StateSynchronizer::new(graph.clone(), bus.clone()).with_timeout(config.state_timeout);
        let builder = Arc::new(BranchBuilder::new(
            config.name.clone(),
            graph.clone(),
            nodes,
            sync.clone(),
            bus.clone(),
            config.classifier,
            config.branches,
            muxer,
        ));
        let (handler, dispatcher) = Dispatcher::start(&builder, config.dispatch)
            .map_err(|e| BuildError::Worker {
                reason: e.to_string(),
            })?;
        graph.connect_pad_added(demuxer, handler, bus.clone());

        info!(
            pipeline = %config.name,
            dispatch = ?config.dispatch,
            policy = ?config.failure_policy,
            "skeleton built"
        );

        Ok(Self {
            name: config.name,
            graph,
            bus,
            cancel: CancellationToken::new(),
            sync,
            bus_supervisor: BusSupervisor::new(watch, config.failure_policy),
            builder: Some(builder),
            dispatcher,
            skeleton: Some(Skeleton {
                source,
                demuxer,
                muxer,
                sink,
            }),
        })
    }

    /// Build a static linear pipeline from a chain description such as
    /// `"audiotestsrc num-buffers=10 ! audioconvert ! fakesink"`.
    ///
    /// No branches are grown; errors abort the run.
    pub fn launch(description: &str, factory: Arc<ElementFactory>) -> Result<Self, BuildError> {
        init_metrics();
        let chain = parse_chain(description)?;
        if chain.len() < 2 {
            return Err(BuildError::TooShort { count: chain.len() });
        }

        let elements = chain
            .elements
            .iter()
            .map(|parsed| factory.make_parsed(parsed))
            .collect::<Result<Vec<_>, _>>()?;

        let name = "launch0".to_string();
        let graph = SharedGraph::new();
        let (bus, watch) = Bus::channel();
        let ids = graph.transaction(|g| g.add_chain(elements))?;

        // Sources use the emitter to post end of stream; nothing is built
        // for dynamic pads here.
        let pipeline = name.clone();
        let handler: StreamHandler = Arc::new(move |msg| {
            warn!(
                pipeline = %pipeline,
                pad = %msg.pad.name(),
                caps = %msg.caps,
                "ignoring dynamic pad in static pipeline"
            );
        });
        for id in &ids {
            graph.connect_pad_added(*id, Arc::clone(&handler), bus.clone());
        }

        info!(pipeline = %name, chain = %chain, "static pipeline built");

        Ok(Self {
            name,
            sync: StateSynchronizer::new(graph.clone(), bus.clone()),
            graph,
            bus,
            cancel: CancellationToken::new(),
            bus_supervisor: BusSupervisor::new(watch, FailurePolicy::Abort),
            builder: None,
            dispatcher: Dispatcher::default(),
            skeleton: None,
        })
    }

    /// Start playback and supervise the bus until the pipeline stops.
    ///
    /// Whatever ends the run, the pipeline is brought back to `Null` before
    /// this returns.
    pub async fn run(&mut self) -> Result<TerminationReason, RunError> {
        if self.bus_supervisor.state() == SupervisorState::Stopped {
            return Err(RunError::AlreadyStopped);
        }
        let span = span_pipeline(&self.name);

        let sync = self.sync.clone();
        let started = blocking(move || sync.set_target(LifecycleState::Playing))
            .instrument(span.clone())
            .await;
        if let Err(e) = started {
            warn!(pipeline = %self.name, error = %e, "failed to start pipeline");
            let sync = self.sync.clone();
            let mut dispatcher = std::mem::take(&mut self.dispatcher);
            blocking(move || {
                dispatcher.shutdown();
                if let Err(e) = sync.set_target(LifecycleState::Null) {
                    warn!(error = %e, "teardown after failed start");
                }
            })
            .await;
            self.bus_supervisor.stop();
            return Err(RunError::Start(e));
        }
        info!(pipeline = %self.name, "pipeline playing");

        let sync = self.sync.clone();
        let mut dispatcher = std::mem::take(&mut self.dispatcher);
        let teardown = move || {
            blocking(move || {
                dispatcher.shutdown();
                match sync.set_target(LifecycleState::Null) {
                    Ok(()) => debug!("pipeline stopped"),
                    Err(e) => warn!(error = %e, "error while stopping pipeline"),
                }
            })
        };

        let reason = self
            .bus_supervisor
            .run(self.cancel.clone(), teardown)
            .instrument(span)
            .await?;
        info!(pipeline = %self.name, reason = ?reason, "pipeline finished");
        Ok(reason)
    }

    /// Change the pipeline target state and wait until every node follows.
    ///
    /// Blocks the calling thread; do not call from async code.
    pub fn set_target(&self, target: LifecycleState) -> Result<(), StateError> {
        self.sync.set_target(target)
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bus for posting application events.
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// The pipeline graph.
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Graphviz rendering of the current graph.
    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed nodes, for pipelines built with [`build`](Self::build).
    pub fn skeleton(&self) -> Option<Skeleton> {
        self.skeleton
    }

    /// Branch errors tolerated under [`FailurePolicy::Continue`].
    pub fn tolerated_errors(&self) -> &[ErrorMessage] {
        self.bus_supervisor.tolerated()
    }

    /// Phase of the bus supervisor.
    pub fn state(&self) -> SupervisorState {
        self.bus_supervisor.state()
    }

    /// Whether the pipeline grows branches for discovered streams.
    pub fn is_dynamic(&self) -> bool {
        self.builder.is_some()
    }
}

fn with_location(parsed: &ParsedElement, location: &str) -> ParsedElement {
    parsed
        .clone()
        .with_property("location", PropertyValue::from(location))
}

/// Run blocking graph work off the async runtime.
async fn blocking<R, F>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(r) => r,
        Err(e) => match e.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(e) => unreachable!("blocking task cancelled: {e}"),
        },
    }
}

/// Build a remux pipeline with the built-in elements and default settings.
pub fn build_pipeline(
    source_location: &str,
    sink_location: &str,
) -> Result<PipelineSupervisor, BuildError> {
    PipelineSupervisor::build(
        SupervisorConfig::remux(source_location, sink_location),
        Arc::new(ElementFactory::new()),
    )
}

/// Run `pipeline` to completion.
pub async fn run(pipeline: &mut PipelineSupervisor) -> Result<TerminationReason, RunError> {
    pipeline.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CreationError, LinkError};

    #[test]
    fn test_build_skeleton() {
        let pipeline = build_pipeline("/tmp/in.mkv", "/tmp/out.webm").unwrap();
        let skeleton = pipeline.skeleton().unwrap();

        pipeline.graph().read(|g| {
            assert_eq!(g.node_count(), 4);
            assert_eq!(g.link_count(), 2);
            assert_eq!(
                g.peer(&PadRef::new(skeleton.source, "src")),
                Some(&PadRef::new(skeleton.demuxer, "sink"))
            );
            assert_eq!(
                g.peer(&PadRef::new(skeleton.muxer, "src")),
                Some(&PadRef::new(skeleton.sink, "sink"))
            );
            assert_eq!(g.node(skeleton.demuxer).unwrap().name(), "decodebin0");
        });
        assert!(pipeline.is_dynamic());
        assert_eq!(pipeline.state(), SupervisorState::Idle);
    }

    #[test]
    fn test_build_unknown_kind() {
        let skeleton = SkeletonConfig::from_descriptions("filesrc", "matroskademux", "webmmux", "filesink")
            .unwrap();
        let err = PipelineSupervisor::build(
            SupervisorConfig::default().with_skeleton(skeleton),
            Arc::new(ElementFactory::new()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::Creation(CreationError::UnknownKind {
                kind: "matroskademux".into()
            })
        );
    }

    #[test]
    fn test_build_incompatible_skeleton() {
        // An audio encoder cannot take the place of the sink.
        let skeleton = SkeletonConfig::from_descriptions("filesrc", "decodebin", "webmmux", "vorbisenc")
            .unwrap();
        let err = PipelineSupervisor::build(
            SupervisorConfig::default().with_skeleton(skeleton),
            Arc::new(ElementFactory::new()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Link(LinkError::IncompatibleCapabilities { .. })
        ));
    }

    #[test]
    fn test_skeleton_descriptions_take_one_element() {
        let err =
            SkeletonConfig::from_descriptions("filesrc ! queue", "decodebin", "webmmux", "filesink")
                .unwrap_err();
        assert_eq!(err, BuildError::TooShort { count: 2 });
    }

    #[test]
    fn test_launch_rejects_single_element() {
        let err = PipelineSupervisor::launch("fakesink", Arc::new(ElementFactory::new()))
            .unwrap_err();
        assert_eq!(err, BuildError::TooShort { count: 1 });
    }

    #[test]
    fn test_config_builders() {
        let config = SupervisorConfig::remux("a.mkv", "b.webm")
            .with_name("remux")
            .with_failure_policy(FailurePolicy::Continue)
            .with_dispatch(DiscoveryDispatch::Worker)
            .with_state_timeout(Duration::from_millis(250));
        assert_eq!(config.name, "remux");
        assert_eq!(config.source_location.as_deref(), Some("a.mkv"));
        assert_eq!(config.sink_location.as_deref(), Some("b.webm"));
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.dispatch, DiscoveryDispatch::Worker);
        assert_eq!(config.state_timeout, Duration::from_millis(250));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_run_returns_to_null() {
        let mut pipeline = build_pipeline("/tmp/in.mkv", "/tmp/out.webm").unwrap();
        let cancel = pipeline.cancel_handle();
        cancel.cancel();

        let reason = pipeline.run().await.unwrap();
        assert_eq!(reason, TerminationReason::Cancelled);
        assert_eq!(pipeline.state(), SupervisorState::Stopped);
        pipeline.graph().read(|g| {
            for id in g.nodes() {
                assert_eq!(g.node(id).unwrap().state(), LifecycleState::Null);
            }
        });

        assert_eq!(pipeline.run().await.unwrap_err(), RunError::AlreadyStopped);
    }
}
