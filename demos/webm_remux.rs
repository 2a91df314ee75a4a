//! WebM remux with dynamically grown branches.
//!
//! Builds `filesrc ! decodebin` and `webmmux ! filesink`, then lets the
//! demuxer announce its streams. Each stream gets a branch:
//!
//! ```text
//! audio: queue ! audioconvert ! vorbisenc ! queue -> webmmux:audio_%u
//! video: queue ! videoconvert ! vp8enc    ! queue -> webmmux:video_%u
//! ```
//!
//! The reference demuxer does not read the file; the streams it announces
//! come from the third argument.
//!
//! Run with:
//! `cargo run --example webm_remux -- in.mkv out.webm "audio/x-vorbis; video/x-vp8; text/x-subtitle"`
//!
//! Set `RUST_LOG=padweave=debug` to see every state step.

use padweave::pipeline::{
    ElementFactory, FailurePolicy, ParsedElement, PipelineSupervisor,
    PropertyValue, SkeletonConfig, SupervisorConfig, TerminationReason,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> padweave::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("padweave=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "input.mkv".to_string());
    let output = args.next().unwrap_or_else(|| "output.webm".to_string());
    let streams = args
        .next()
        .unwrap_or_else(|| "audio/x-vorbis; video/x-vp8; text/x-subtitle".to_string());

    println!("WebM remux: {input} -> {output}");
    println!("Announced streams: {streams}\n");

    let skeleton = SkeletonConfig {
        demuxer: ParsedElement::new("decodebin")
            .with_property("streams", PropertyValue::from(streams))
            .with_property("interval-ms", PropertyValue::Integer(50)),
        ..SkeletonConfig::default()
    };
    let config = SupervisorConfig::remux(input, output)
        .with_name("remux")
        .with_skeleton(skeleton)
        .with_failure_policy(FailurePolicy::Continue);

    let mut pipeline = PipelineSupervisor::build(config, Arc::new(ElementFactory::new()))?;

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let reason = pipeline.run().await?;

    println!("\nFinal graph:\n{}", pipeline.to_dot());
    for err in pipeline.tolerated_errors() {
        println!("tolerated: {err}");
    }
    match reason {
        TerminationReason::EndOfStream => println!("Remux finished."),
        TerminationReason::Cancelled => println!("Remux cancelled."),
        TerminationReason::Error(err) => println!("Remux failed: {err}"),
    }
    Ok(())
}
