/// diskinventory core: scanning, aggregation, and the data model.
///
/// This crate contains all engine logic with zero UI dependencies. A
/// frontend drives a [`scanner::Scanner`], hands the finished tree to a
/// [`document::Document`], and redraws when the document publishes events.
///
/// # Modules
///
/// - [`model`]: Arena-allocated file tree and supporting types.
/// - [`kinds`]: File kind classification and per-kind statistics.
/// - [`scanner`]: Background, cancellable folder scan with throttled progress.
/// - [`document`]: Zoom, selection, and incremental mutation of a scanned tree.
/// - [`platform`]: Physical sizes, volume capacity, and the trash.
/// - [`error`]: Crate-wide error type.
pub mod document;
pub mod error;
pub mod kinds;
pub mod model;
pub mod platform;
pub mod scanner;

pub use document::{Document, DocumentEvent, ViewOption};
pub use error::{Error, ErrorKind, Result};
pub use model::{FsTree, NodeIndex};
pub use scanner::{CancelToken, ScanDelegate, ScanObserver, ScanOptions, ScanState, Scanner};
