/// Scanner module: builds an [`FsTree`] for one folder on a background
/// thread.
///
/// The scan runs on a dedicated worker thread. The thread that owns the
/// [`Scanner`] pumps it with [`Scanner::poll`] (once per frame or timer tick)
/// or blocks in [`Scanner::wait`]; every observer callback runs there, never
/// on the worker. The finished tree is moved across in one piece through a
/// single-slot channel.
///
/// State machine: `Idle → Scanning → Finished | Failed | Cancelled`.
/// Exactly one terminal callback is delivered per started scan.
pub mod options;
pub mod progress;
mod walker;

pub use options::{DefaultDelegate, ScanDelegate, ScanOptions};
pub use progress::{ScanObserver, ScanProgress, PROGRESS_INTERVAL};
pub use walker::{scan_folder, scan_item};

use crate::error::{Error, Result};
use crate::model::size::{format_count, format_size};
use crate::model::FsTree;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use progress::ProgressCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};
use walker::Walk;

/// Capacity of the channel carrying the finished tree. One scan produces
/// exactly one outcome.
pub const OUTCOME_CHANNEL_CAPACITY: usize = 1;

/// Lifecycle of a [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Scanning = 1,
    Finished = 2,
    Failed = 3,
    Cancelled = 4,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Finished,
            3 => Self::Failed,
            4 => Self::Cancelled,
            _ => Self::Idle,
        }
    }

    /// `true` once a terminal callback has been delivered.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// Flags and counters shared between the scanner and its worker thread.
#[derive(Debug, Default)]
pub(crate) struct ScanShared {
    pub(crate) cancel: AtomicBool,
    state: AtomicU8,
    pub(crate) files_found: AtomicU64,
    pub(crate) folders_found: AtomicU64,
    pub(crate) error_count: AtomicU64,
    pub(crate) progress: ProgressCell,
}

impl ScanShared {
    fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ScanState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Cancelling is only meaningful while a scan is running; before start
    /// and after the terminal callback it does nothing.
    fn request_cancel(&self) {
        if self.state() == ScanState::Scanning && !self.cancel.swap(true, Ordering::SeqCst) {
            debug!("Scan cancellation requested");
        }
    }
}

/// Cloneable handle that cancels a running scan from any thread,
/// including from inside a [`ScanDelegate`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    shared: Arc<ScanShared>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }
}

/// Background scan of one folder.
pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
    delegate: Option<Box<dyn ScanDelegate>>,
    shared: Arc<ScanShared>,
    outcome_rx: Option<Receiver<Result<FsTree>>>,
    thread: Option<JoinHandle<()>>,
    last_progress: Option<Instant>,
    started: Option<Instant>,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
            delegate: None,
            shared: Arc::new(ScanShared::default()),
            outcome_rx: None,
            thread: None,
            last_progress: None,
            started: None,
        }
    }

    /// Attach a delegate. It moves to the worker thread on [`start`](Self::start).
    pub fn with_delegate(mut self, delegate: impl ScanDelegate + 'static) -> Self {
        self.delegate = Some(Box::new(delegate));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Validate the root and spawn the worker thread.
    ///
    /// Fails with [`Error::InvalidState`] if this scanner was already started
    /// and with [`Error::InvalidArgument`] if the root is missing or is not a
    /// folder. No callback is delivered for either failure.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != ScanState::Idle {
            return Err(Error::InvalidState("scanner was already started"));
        }
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::InvalidArgument {
                    path: self.root.clone(),
                    reason: "not a folder".into(),
                })
            }
            Err(err) => {
                return Err(Error::InvalidArgument {
                    path: self.root.clone(),
                    reason: err.to_string(),
                })
            }
        }

        let mut delegate = self
            .delegate
            .take()
            .unwrap_or_else(|| Box::new(DefaultDelegate));
        let options = self.options.resolve(delegate.as_ref());
        let (outcome_tx, outcome_rx) =
            crossbeam_channel::bounded::<Result<FsTree>>(OUTCOME_CHANNEL_CAPACITY);
        let shared = Arc::clone(&self.shared);
        let root = self.root.clone();

        info!("Starting scan of {}", self.root.display());
        self.shared.set_state(ScanState::Scanning);
        self.started = Some(Instant::now());

        let spawned = thread::Builder::new()
            .name("diskinventory-scanner".into())
            .spawn(move || {
                let outcome = Walk::new(options, &shared, delegate.as_mut()).build_tree(&root);
                // The receiver is gone only if the scanner was dropped.
                let _ = outcome_tx.send(outcome);
            });

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                self.outcome_rx = Some(outcome_rx);
                Ok(())
            }
            Err(err) => {
                self.shared.set_state(ScanState::Failed);
                Err(Error::loading(&self.root, err))
            }
        }
    }

    /// Request cancellation. Idempotent; a no-op unless scanning.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> ScanState {
        self.shared.state()
    }

    /// Files discovered so far. Approximate while scanning, exact after.
    pub fn files_found(&self) -> u64 {
        self.shared.files_found.load(Ordering::Relaxed)
    }

    pub fn folders_found(&self) -> u64 {
        self.shared.folders_found.load(Ordering::Relaxed)
    }

    /// Unreadable folders that were skipped (see
    /// [`ScanOptions::skip_unreadable`]).
    pub fn error_count(&self) -> u64 {
        self.shared.error_count.load(Ordering::Relaxed)
    }

    /// Deliver any pending progress (throttled) and, if the worker is done,
    /// the terminal callback. Never blocks.
    ///
    /// Returns `true` when this call delivered the terminal callback.
    pub fn poll(&mut self, observer: &mut dyn ScanObserver) -> bool {
        if self.state() != ScanState::Scanning {
            return false;
        }
        let received = match &self.outcome_rx {
            Some(rx) => rx.try_recv(),
            None => return false,
        };
        match received {
            Ok(outcome) => {
                self.deliver(outcome, observer);
                true
            }
            Err(TryRecvError::Empty) => {
                self.report_progress(observer, false);
                false
            }
            Err(TryRecvError::Disconnected) => {
                self.deliver(Err(worker_vanished()), observer);
                true
            }
        }
    }

    /// Pump until the terminal callback has been delivered and return the
    /// final state. Returns immediately if the scanner is not scanning.
    pub fn wait(&mut self, observer: &mut dyn ScanObserver) -> ScanState {
        while self.state() == ScanState::Scanning {
            let received = match &self.outcome_rx {
                Some(rx) => rx.recv_timeout(PROGRESS_INTERVAL),
                None => break,
            };
            match received {
                Ok(outcome) => self.deliver(outcome, observer),
                Err(RecvTimeoutError::Timeout) => self.report_progress(observer, false),
                Err(RecvTimeoutError::Disconnected) => {
                    self.deliver(Err(worker_vanished()), observer)
                }
            }
        }
        self.state()
    }

    /// Hand the latest published folder to the observer, at most once per
    /// [`PROGRESS_INTERVAL`] unless `flush` is set.
    fn report_progress(&mut self, observer: &mut dyn ScanObserver, flush: bool) {
        let due = flush
            || self
                .last_progress
                .map_or(true, |at| at.elapsed() >= PROGRESS_INTERVAL);
        if !due {
            return;
        }
        let Some(current_path) = self.shared.progress.take() else {
            return;
        };
        self.last_progress = Some(Instant::now());
        observer.did_enter_folder(&ScanProgress {
            current_path,
            files_found: self.files_found(),
            folders_found: self.folders_found(),
        });
    }

    fn deliver(&mut self, outcome: Result<FsTree>, observer: &mut dyn ScanObserver) {
        self.report_progress(observer, true);
        self.outcome_rx = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Scanner thread panicked");
            }
        }

        let elapsed = self.started.map(|at| at.elapsed()).unwrap_or_default();
        let cancelled = self.shared.cancel.load(Ordering::SeqCst);

        match outcome {
            Err(Error::LoadingCanceled) => self.finish_cancelled(observer),
            _ if cancelled => self.finish_cancelled(observer),
            Ok(tree) => {
                let total = tree.root().map_or(0, |root| tree.size(root));
                info!(
                    "Scan of {} finished in {:.2?}: {} files, {} folders, {}",
                    self.root.display(),
                    elapsed,
                    format_count(self.files_found()),
                    format_count(self.folders_found()),
                    format_size(total),
                );
                self.shared.set_state(ScanState::Finished);
                observer.did_finish(tree);
            }
            Err(err) => {
                warn!("Scan of {} failed: {err}", self.root.display());
                self.shared.set_state(ScanState::Failed);
                observer.did_fail(err);
            }
        }
    }

    fn finish_cancelled(&mut self, observer: &mut dyn ScanObserver) {
        info!("Scan of {} cancelled", self.root.display());
        self.shared.set_state(ScanState::Cancelled);
        observer.did_cancel();
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        // The worker notices at its next folder checkpoint and exits; its
        // result is discarded with the channel.
        self.shared.request_cancel();
    }
}

fn worker_vanished() -> Error {
    Error::InvalidState("scanner thread exited without a result")
}
