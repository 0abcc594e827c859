//! Gherkin scenarios for the Vigenza engine
//!
//! Each scenario declares acts and amendment clauses, ingests them as one
//! batch and checks the derived statuses and anomalies. Feature files live in
//! `features/` at the workspace root.
//!
//! ```bash
//! cargo test --test bdd -- --nocapture
//! ```

#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

mod steps;
mod world;

use cucumber::World;
use std::path::PathBuf;

fn features_dir() -> PathBuf {
    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .expect("engine package sits two levels below the workspace root");
    let dir = workspace_root.join("features");
    assert!(dir.is_dir(), "no features at {}", dir.display());
    dir
}

#[tokio::main]
async fn main() {
    // RUST_LOG=vigenza_engine=debug shows resolution and status derivation
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .init();

    // Each scenario builds its own service
    world::VigenzaWorld::cucumber()
        .with_default_cli()
        .fail_on_skipped()
        .run_and_exit(features_dir())
        .await;
}
