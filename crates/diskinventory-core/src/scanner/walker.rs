/// Sequential depth-first walker that builds an [`FsTree`].
///
/// Uses `walkdir`, which yields entries in pre-order and in the order the
/// filesystem enumerates them. The walker keeps a stack of open folders:
/// when an entry arrives at depth `d`, every open folder at depth `>= d` is
/// complete, so its size is finalised (sum of children) before its parent
/// sees another entry.
///
/// The traversal is deliberately single-threaded. `walkdir` caps the number
/// of simultaneously open directory handles, and sizes can be summed on the
/// way back up without any locking.
use super::options::{DefaultDelegate, ScanDelegate, ScanOptions};
use super::ScanShared;
use crate::error::{Error, Result};
use crate::kinds::is_package_name;
use crate::model::{EntryKind, FsNode, FsTree, NodeIndex};
use crate::platform;
use compact_str::CompactString;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Initial arena capacity for a scan. The arena grows as needed.
const INITIAL_CAPACITY: usize = 4_096;

/// One traversal: resolved options, the shared counters/flags, and the
/// delegate whose gates are consulted per folder.
pub(crate) struct Walk<'a> {
    options: ScanOptions,
    shared: &'a ScanShared,
    delegate: &'a mut dyn ScanDelegate,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(
        options: ScanOptions,
        shared: &'a ScanShared,
        delegate: &'a mut dyn ScanDelegate,
    ) -> Self {
        Self {
            options,
            shared,
            delegate,
        }
    }

    /// Walk the folder at `root` and return the finished tree.
    pub(crate) fn build_tree(&mut self, root: &Path) -> Result<FsTree> {
        let mut tree = FsTree::with_capacity(root, INITIAL_CAPACITY);
        // Open folders; `open[d]` is the folder at depth `d`.
        let mut open: Vec<(NodeIndex, PathBuf)> = Vec::new();

        let mut entries = WalkDir::new(root).follow_links(false).into_iter();
        while let Some(next) = entries.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    self.tolerate(err, root, &mut tree, &open)?;
                    continue;
                }
            };

            let depth = entry.depth();
            while open.len() > depth {
                if let Some((folder, path)) = open.pop() {
                    self.leave_folder(&mut tree, folder, &path)?;
                }
            }

            let name = entry_name(entry.path(), entry.file_name());
            let path = entry.path();
            let parent = open.last().map(|(idx, _)| *idx);

            if entry.file_type().is_dir() {
                self.checkpoint()?;
                let package = is_package_name(&name);

                if package && !self.options.look_into_packages && depth > 0 {
                    entries.skip_current_dir();
                    let idx = self.opaque_package(&mut tree, name, path, root)?;
                    attach(&mut tree, parent, idx)?;
                    continue;
                }

                let kind = if package {
                    EntryKind::Package { expanded: true }
                } else {
                    EntryKind::Folder
                };
                let idx = tree.add_node(FsNode::new_folder(name, kind));
                tree.set_kind_string(idx, self.options.ignore_creator_code);
                attach(&mut tree, parent, idx)?;
                self.shared.folders_found.fetch_add(1, Ordering::Relaxed);

                self.enter_folder(path)?;
                open.push((idx, path.to_path_buf()));
            } else {
                if depth == 0 {
                    return Err(Error::InvalidArgument {
                        path: root.to_path_buf(),
                        reason: "not a folder".into(),
                    });
                }
                let meta = entry.metadata()?;
                let idx = self.add_leaf(&mut tree, name, path, &meta);
                attach(&mut tree, parent, idx)?;
            }
        }

        while let Some((folder, path)) = open.pop() {
            self.leave_folder(&mut tree, folder, &path)?;
        }

        if tree.root().is_none() {
            return Err(Error::InvalidArgument {
                path: root.to_path_buf(),
                reason: "nothing to scan".into(),
            });
        }
        Ok(tree)
    }

    /// Scan a single item: a folder is walked, an unexpanded package is
    /// measured as one leaf, anything else becomes a one-node tree.
    pub(crate) fn scan_item(&mut self, path: &Path) -> Result<FsTree> {
        let meta = fs::symlink_metadata(path).map_err(|e| Error::loading(path, e))?;
        let name = entry_name(path, path.as_os_str());

        if meta.is_dir() {
            if is_package_name(&name) && !self.options.look_into_packages {
                let mut tree = FsTree::new(path);
                let idx = self.opaque_package(&mut tree, name, path, path)?;
                tree.set_root(idx)?;
                return Ok(tree);
            }
            return self.build_tree(path);
        }

        let mut tree = FsTree::new(path);
        let idx = self.add_leaf(&mut tree, name, path, &meta);
        tree.set_root(idx)?;
        Ok(tree)
    }

    /// Cancellation checkpoint, offered before every folder is entered.
    fn checkpoint(&self) -> Result<()> {
        if self.shared.cancel.load(Ordering::SeqCst) {
            debug!("Cancellation observed at folder checkpoint");
            return Err(Error::LoadingCanceled);
        }
        Ok(())
    }

    fn enter_folder(&mut self, path: &Path) -> Result<()> {
        if !self.delegate.entering_folder(path) {
            debug!("Delegate declined to enter {}", path.display());
            return Err(Error::LoadingCanceled);
        }
        self.shared.progress.publish(path);
        Ok(())
    }

    fn leave_folder(&mut self, tree: &mut FsTree, folder: NodeIndex, path: &Path) -> Result<()> {
        tree.recalculate_size(folder, self.options.use_physical_size, false)?;
        if !self.delegate.exiting_folder(path) {
            debug!("Delegate stopped the scan leaving {}", path.display());
            return Err(Error::LoadingCanceled);
        }
        Ok(())
    }

    fn add_leaf(&self, tree: &mut FsTree, name: CompactString, path: &Path, meta: &Metadata) -> NodeIndex {
        let kind = if meta.file_type().is_symlink() {
            EntryKind::Alias {
                target_is_dir: fs::metadata(path).is_ok_and(|m| m.is_dir()),
            }
        } else {
            EntryKind::File
        };
        let mut node = FsNode::new_leaf(
            name,
            kind,
            platform::measured_size(meta, self.options.use_physical_size),
        );
        if let Some(entry) = node.entry_mut() {
            entry.executable = platform::is_executable(meta);
        }
        let idx = tree.add_node(node);
        tree.set_kind_string(idx, self.options.ignore_creator_code);
        self.shared.files_found.fetch_add(1, Ordering::Relaxed);
        idx
    }

    /// Measure a package as one unit without creating nodes for its contents.
    ///
    /// With `skip_unreadable`, folders inside the package that cannot be read
    /// are left out of the total and the package is flagged `unreadable`.
    /// `scan_root` itself must always be readable.
    fn opaque_package(
        &self,
        tree: &mut FsTree,
        name: CompactString,
        path: &Path,
        scan_root: &Path,
    ) -> Result<NodeIndex> {
        let mut total: u64 = 0;
        let mut unreadable = false;
        for next in WalkDir::new(path).follow_links(false) {
            let metadata = next.and_then(|entry| {
                let meta = entry.metadata()?;
                Ok((entry, meta))
            });
            let (entry, meta) = match metadata {
                Ok(found) => found,
                Err(err) if self.skippable(&err, scan_root) => {
                    warn!("Skipping unreadable folder inside package: {err}");
                    self.shared.error_count.fetch_add(1, Ordering::Relaxed);
                    unreadable = true;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if entry.file_type().is_dir() {
                self.checkpoint()?;
                continue;
            }
            total += platform::measured_size(&meta, self.options.use_physical_size);
        }

        let mut node = FsNode::new_leaf(name, EntryKind::Package { expanded: false }, total);
        if let Some(entry) = node.entry_mut() {
            entry.unreadable = unreadable;
        }
        let idx = tree.add_node(node);
        tree.set_kind_string(idx, self.options.ignore_creator_code);
        self.shared.files_found.fetch_add(1, Ordering::Relaxed);
        Ok(idx)
    }

    /// `true` if `err` may be skipped: the caller asked to skip unreadable
    /// folders and the failure is an I/O error below `scan_root`.
    fn skippable(&self, err: &walkdir::Error, scan_root: &Path) -> bool {
        self.options.skip_unreadable
            && err.io_error().is_some()
            && err.path().is_some_and(|p| p != scan_root)
    }

    /// Decide whether an enumeration error ends the scan. With
    /// `skip_unreadable`, a non-root folder that cannot be read stays in the
    /// tree as an empty node flagged `unreadable`.
    fn tolerate(
        &self,
        err: walkdir::Error,
        root: &Path,
        tree: &mut FsTree,
        open: &[(NodeIndex, PathBuf)],
    ) -> Result<()> {
        if !self.skippable(&err, root) {
            return Err(err.into());
        }
        let failed_path = err.path().map(Path::to_path_buf);

        warn!("Skipping unreadable folder: {err}");
        self.shared.error_count.fetch_add(1, Ordering::Relaxed);
        if let Some((idx, _)) = open
            .iter()
            .rev()
            .find(|(_, path)| Some(path) == failed_path.as_ref())
        {
            if let Some(entry) = tree.get_entry_mut(*idx) {
                entry.unreadable = true;
            }
        }
        Ok(())
    }
}

/// Synchronously walk the folder at `path` as a scan root: it is always
/// looked into, even when its name marks it as a package.
///
/// Used to re-read a document's root item.
pub fn scan_folder(path: &Path, options: &ScanOptions) -> Result<FsTree> {
    let shared = ScanShared::default();
    let mut delegate = DefaultDelegate;
    let resolved = options.resolve(&delegate);
    Walk::new(resolved, &shared, &mut delegate).build_tree(path)
}

/// Synchronously scan one item with the default delegate.
///
/// Used for bounded rescans of a subtree (refresh, package toggling) where
/// the caller already owns the surrounding tree.
pub fn scan_item(path: &Path, options: &ScanOptions) -> Result<FsTree> {
    let shared = ScanShared::default();
    let mut delegate = DefaultDelegate;
    let resolved = options.resolve(&delegate);
    Walk::new(resolved, &shared, &mut delegate).scan_item(path)
}

fn attach(tree: &mut FsTree, parent: Option<NodeIndex>, child: NodeIndex) -> Result<()> {
    match parent {
        Some(parent) => tree.insert_child(parent, child, false),
        None => tree.set_root(child),
    }
}

/// Node name for a path. The scan root keeps its full display string when
/// it has no final component (e.g. `/`).
fn entry_name(path: &Path, file_name: &std::ffi::OsStr) -> CompactString {
    let name = path
        .file_name()
        .unwrap_or(file_name)
        .to_string_lossy();
    CompactString::new(name)
}
