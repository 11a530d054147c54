/// Moving items to the trash.
///
/// The side effect sits behind [`TrashCan`] so the document can be driven
/// against a fake in tests and so failures can be rolled back cleanly.
use std::io;
use std::path::Path;
use tracing::debug;

/// Something that can take a path out of the filesystem.
pub trait TrashCan {
    /// Move `path` to the trash. On error nothing must have changed.
    fn move_to_trash(&self, path: &Path) -> io::Result<()>;
}

/// The user's real trash, via the `trash` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl TrashCan for SystemTrash {
    fn move_to_trash(&self, path: &Path) -> io::Result<()> {
        debug!("Moving {} to the trash", path.display());
        trash::delete(path).map_err(io::Error::other)
    }
}
