//! Shared fixtures for the integration scenarios.

use std::io::Read;
use std::sync::Arc;

use hashfs_overlay::{Config, HashAlgo, HashFs, ListEntry};
use hashfs_store::{MemoryStore, ObjectStore, OpContext};

/// Install the fmt subscriber once so `RUST_LOG` works under `cargo test`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh overlay over a fresh in-memory store.
pub fn overlay(algo: HashAlgo) -> (Arc<MemoryStore>, Arc<HashFs>, OpContext) {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let ctx = OpContext::background();
    let fs = Arc::new(
        HashFs::new(
            &ctx,
            "overlay",
            store.clone(),
            Config::with_algo("backing", algo),
        )
        .expect("fresh store must construct"),
    );
    (store, fs, ctx)
}

/// Reconstruct an overlay over an existing store, as after a restart.
pub fn reload(store: &Arc<MemoryStore>, algo: HashAlgo) -> Arc<HashFs> {
    let ctx = OpContext::background();
    Arc::new(
        HashFs::new(
            &ctx,
            "overlay",
            store.clone(),
            Config::with_algo("backing", algo),
        )
        .expect("persisted index must reload"),
    )
}

/// Read a raw store object as a string.
pub fn read_raw(store: &MemoryStore, ctx: &OpContext, key: &str) -> String {
    let mut out = String::new();
    store
        .get(ctx, key)
        .expect("object must exist")
        .read_to_string(&mut out)
        .expect("object must be UTF-8");
    out
}

/// Logical paths of a listing, in listing order.
pub fn listed_paths(entries: &[ListEntry]) -> Vec<String> {
    entries.iter().map(|e| e.path().to_string()).collect()
}
