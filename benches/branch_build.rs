//! Branch construction benchmarks for padweave.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use padweave::element::LifecycleState;
use padweave::format::Caps;
use padweave::pipeline::branch::BranchBuilder;
use padweave::pipeline::{
    Bus, BranchTable, ElementFactory, NodeFactory, NodeId, SharedGraph, StateSynchronizer,
    StreamClassifier, StreamDiscovered, parse_chain,
};
use std::hint::black_box;
use std::sync::Arc;

struct Fixture {
    graph: SharedGraph,
    builder: BranchBuilder,
    demux: NodeId,
}

fn fixture(factory: &Arc<ElementFactory>, target: LifecycleState) -> Fixture {
    let graph = SharedGraph::new();
    // The bus watch is dropped; posts are discarded.
    let (bus, _watch) = Bus::channel();
    let nodes = NodeFactory::new(Arc::clone(factory), graph.clone());
    let demux = nodes.create("decodebin").unwrap();
    let mux = nodes.create("webmmux").unwrap();

    let sync = StateSynchronizer::new(graph.clone(), bus.clone());
    sync.set_target(target).unwrap();

    let builder = BranchBuilder::new(
        "bench",
        graph.clone(),
        nodes,
        sync,
        bus,
        StreamClassifier::default(),
        BranchTable::default(),
        mux,
    );
    Fixture {
        graph,
        builder,
        demux,
    }
}

fn discover(f: &Fixture, caps: &Caps) -> StreamDiscovered {
    let pad = f
        .graph
        .add_dynamic_pad(f.demux, "src_%u", caps.clone())
        .unwrap();
    StreamDiscovered {
        node: f.demux,
        pad,
        caps: caps.clone(),
    }
}

fn bench_single_branch(c: &mut Criterion) {
    let factory = Arc::new(ElementFactory::new());
    let caps = Caps::simple("audio/x-vorbis");
    let mut group = c.benchmark_group("single_branch");

    for target in [LifecycleState::Null, LifecycleState::Playing] {
        group.bench_with_input(
            BenchmarkId::new("target", format!("{target:?}")),
            &target,
            |b, &target| {
                b.iter_batched(
                    || fixture(&factory, target),
                    |f| {
                        let msg = discover(&f, &caps);
                        black_box(f.builder.handle(msg))
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_many_branches(c: &mut Criterion) {
    let factory = Arc::new(ElementFactory::new());
    let streams = [
        Caps::simple("audio/x-vorbis"),
        Caps::simple("video/x-vp8"),
    ];
    let mut group = c.benchmark_group("many_branches");

    for count in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || fixture(&factory, LifecycleState::Playing),
                |f| {
                    for i in 0..count {
                        let msg = discover(&f, &streams[i % streams.len()]);
                        black_box(f.builder.handle(msg));
                    }
                    f
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let classifier = StreamClassifier::default();
    let caps: Caps = "audio/x-raw, rate=48000; video/x-raw, width=1920"
        .parse()
        .unwrap();

    c.bench_function("classify", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&caps))))
    });
}

fn bench_parse_chain(c: &mut Criterion) {
    c.bench_function("parse_chain", |b| {
        b.iter(|| {
            black_box(
                parse_chain(black_box(
                    "queue max-size-buffers=0 ! audioconvert ! vorbisenc quality=0.5 ! queue",
                ))
                .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_single_branch,
    bench_many_branches,
    bench_classify,
    bench_parse_chain
);
criterion_main!(benches);
