/// Crate-wide error type.
///
/// Scan failures, tree-mutation contract violations and facade rejections
/// all share one enum so callbacks can classify them through [`ErrorKind`].
use crate::model::NodeIndex;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], cheap to copy into callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    LoadingCanceled,
    LoadingFailed,
    InvalidState,
    NotFound,
    InvalidZoomTarget,
    UnknownNode,
    TrashFailed,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The scan target does not exist or is not a container.
    #[error("cannot scan {}: {reason}", path.display())]
    InvalidArgument { path: PathBuf, reason: String },

    /// A delegate gate or an explicit cancel stopped the traversal.
    #[error("loading was canceled")]
    LoadingCanceled,

    /// Enumeration or metadata read failed mid-scan.
    #[error("failed to read {}: {source}", path.display())]
    LoadingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A tree or scanner precondition was violated (e.g. inserting a node
    /// that already has a parent).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// `child` is not a current child of `parent`.
    #[error("node {child:?} is not a child of {parent:?}")]
    NotFound { parent: NodeIndex, child: NodeIndex },

    /// Zoom request for a node outside the currently zoomed subtree.
    #[error("node {target:?} is not inside the zoomed item {zoomed:?}")]
    InvalidZoomTarget { target: NodeIndex, zoomed: NodeIndex },

    /// The index does not refer to a live node (removed, or never existed).
    #[error("node {0:?} is not part of the tree")]
    UnknownNode(NodeIndex),

    /// The external trash move did not succeed; nothing was changed.
    #[error("could not move {} to the trash: {source}", path.display())]
    TrashFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::LoadingCanceled => ErrorKind::LoadingCanceled,
            Self::LoadingFailed { .. } => ErrorKind::LoadingFailed,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidZoomTarget { .. } => ErrorKind::InvalidZoomTarget,
            Self::UnknownNode(_) => ErrorKind::UnknownNode,
            Self::TrashFailed { .. } => ErrorKind::TrashFailed,
        }
    }

    /// Wrap an I/O failure on `path` as a [`Error::LoadingFailed`].
    pub(crate) fn loading(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LoadingFailed {
            path: path.into(),
            source,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
        Self::LoadingFailed { path, source }
    }
}
