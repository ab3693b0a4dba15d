//! Subcommand implementations and the plumbing they share.

pub mod apply;
pub mod flows;
pub mod mapping;
pub mod project;
pub mod release;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use flowsync_core::store;
use flowsync_sync::{Collaborators, LocalPublisher, LocalStore};

/// Resolved home directory (`$FLOWSYNC_HOME` or the user's home).
pub fn home() -> Result<PathBuf> {
    store::home().context("could not determine home directory")
}

/// Collaborators backed by the local store under `home`.
pub fn local_collaborators(home: PathBuf) -> Collaborators {
    let local = LocalStore::new(home);
    let publisher = Arc::new(LocalPublisher::new(local.clone()));
    Collaborators::from_store(Arc::new(local), publisher)
}

/// Drive `fut` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(fut))
}
