/// Scan progress reporting. The worker publishes into a single-slot cell,
/// the main thread drains it at a bounded rate and hands the result to a
/// [`ScanObserver`].
///
/// Overwriting the slot coalesces bursts: whatever path was published last
/// is the one the next drain sees, and a drain can only ever observe paths
/// in the order the worker published them.
use crate::error::Error;
use crate::model::FsTree;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimum spacing between two delivered progress notifications
/// (~30 per second).
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(33);

/// One delivered progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// The folder most recently entered by the scanner.
    pub current_path: PathBuf,
    /// Files discovered so far (approximate under throttling).
    pub files_found: u64,
    /// Folders discovered so far (approximate under throttling).
    pub folders_found: u64,
}

/// Receiver of scan callbacks. All methods run on the thread that pumps the
/// [`Scanner`](super::Scanner), never on the scanner thread.
pub trait ScanObserver {
    /// The scan completed; ownership of the finished tree moves here.
    fn did_finish(&mut self, tree: FsTree);

    /// The scan failed. Nothing of the partial tree survives.
    fn did_fail(&mut self, error: Error);

    /// The scanner entered a folder. Throttled; intermediate folders may be
    /// skipped.
    fn did_enter_folder(&mut self, _progress: &ScanProgress) {}

    /// The scan was cancelled, explicitly or by a delegate gate.
    fn did_cancel(&mut self) {}
}

/// Single-slot "latest value" cell shared between worker and main thread.
#[derive(Debug, Default)]
pub(crate) struct ProgressCell {
    latest: Mutex<Option<PathBuf>>,
}

impl ProgressCell {
    /// Replace whatever is pending with `path`.
    pub(crate) fn publish(&self, path: &Path) {
        *self.latest.lock() = Some(path.to_path_buf());
    }

    /// Take the pending path, leaving the slot empty.
    pub(crate) fn take(&self) -> Option<PathBuf> {
        self.latest.lock().take()
    }
}
