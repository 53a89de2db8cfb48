// Library crate: the scene-diff protocol plus the chat loop that drives it.
// An editor embeds it by implementing `graph::SceneGraph` for its own scene.

pub mod codec;
pub mod command;
pub mod diff;
pub mod error;
pub mod fixtures;
pub mod graph;
pub mod harness;
pub mod snapshot;
pub mod state;

/// Install the `tracing` subscriber. `RUST_LOG` overrides the default filter.
/// Calling it again is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sceneforge_lib=info,transport=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
