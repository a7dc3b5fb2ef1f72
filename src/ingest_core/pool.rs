//! Branch watcher pool - one named OS thread per branch

use super::layout::BranchLayout;
use super::watcher::{BranchWatcher, IngestContext};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Spawn a watcher thread per branch. Any spawn failure is returned to the
/// caller, which treats it as fatal.
pub fn spawn_watchers(
    branches: Vec<BranchLayout>,
    ctx: Arc<IngestContext>,
) -> io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(branches.len());

    for branch in branches {
        let index = branch.index;
        let watcher = BranchWatcher::new(branch, Arc::clone(&ctx));
        let handle = thread::Builder::new()
            .name(format!("branch-{:03}", index))
            .spawn(move || watcher.run())?;
        handles.push(handle);
    }

    log::info!("🧵 {} branch watchers running", handles.len());
    Ok(handles)
}
