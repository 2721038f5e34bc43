//! Custom test assertions for integration tests

use std::path::{Path, PathBuf};

use channel_dl::Event;
use tokio::sync::broadcast;
use walkdir::WalkDir;

/// Every regular file below `root`, relative to it, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Assert no transfer left a `.part` file behind
pub fn assert_no_part_files(root: &Path) {
    let leftovers: Vec<_> = files_under(root)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "part"))
        .collect();
    assert!(leftovers.is_empty(), "partial files left behind: {leftovers:?}");
}

/// Everything currently buffered on an event receiver
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
