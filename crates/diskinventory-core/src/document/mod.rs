/// The document: one scanned tree plus everything derived from it.
///
/// A [`Document`] owns the [`FsTree`] handed over by the scanner, the
/// [`KindIndex`] built from it, the zoom stack and the selection. Mutations
/// (trash, refresh, view-option changes) update the tree and statistics
/// incrementally, touching only the affected subtree, and publish exactly
/// one [`DocumentEvent`] per operation.
///
/// All methods are meant to run on the thread that pumps the scanner.
pub mod events;
pub mod zoom;

pub use events::{DocumentEvent, ViewOption};
pub use zoom::ZoomStack;

use crate::error::{Error, Result};
use crate::kinds::{KindIndex, KindStatistic};
use crate::model::size::format_size;
use crate::model::{FsNode, FsTree, NodeIndex};
use crate::platform::{self, SystemTrash, TrashCan};
use crate::scanner::{self, ScanObserver, ScanOptions};
use crossbeam_channel::Receiver;
use events::Notifier;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A scanned tree with its statistics, zoom and selection.
pub struct Document {
    /// The installed tree. `None` until the first scan finishes.
    tree: Option<FsTree>,

    /// Per-kind statistics over the tree's leaf entries.
    kinds: KindIndex,

    /// Zoom path from the root down to the zoomed item.
    zoom: ZoomStack,

    /// Selected item, always a live node.
    selection: Option<NodeIndex>,

    /// Options used for rescans. The view options live here too.
    options: ScanOptions,

    /// Whether the synthetic free space node is shown.
    show_free_space: bool,

    /// Whether the synthetic other space node is shown.
    show_other_space: bool,

    /// Current free space node, a child of the root.
    free_space_node: Option<NodeIndex>,

    /// Current other space node, a child of the root.
    other_space_node: Option<NodeIndex>,

    /// Where `move_to_trash` sends items.
    trash: Box<dyn TrashCan>,

    /// Subscribers to [`DocumentEvent`]s.
    events: Notifier,
}

impl Document {
    /// An empty document using the system trash.
    pub fn new(options: ScanOptions) -> Self {
        Self::with_trash(options, SystemTrash)
    }

    /// An empty document that trashes items through `trash`.
    pub fn with_trash(options: ScanOptions, trash: impl TrashCan + 'static) -> Self {
        Self {
            tree: None,
            kinds: KindIndex::new(),
            zoom: ZoomStack::default(),
            selection: None,
            options,
            show_free_space: false,
            show_other_space: false,
            free_space_node: None,
            other_space_node: None,
            trash: Box::new(trash),
            events: Notifier::default(),
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    /// The installed tree, if a scan has finished.
    pub fn tree(&self) -> Option<&FsTree> {
        self.tree.as_ref()
    }

    /// Root of the installed tree.
    pub fn root_item(&self) -> Option<NodeIndex> {
        self.tree.as_ref().and_then(FsTree::root)
    }

    pub fn kind_index(&self) -> &KindIndex {
        &self.kinds
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Take ownership of a freshly scanned tree.
    ///
    /// Builds the kind statistics in one traversal, resets zoom to the root,
    /// clears the selection and adds the synthetic space nodes that are
    /// switched on. Publishes one `ItemsChanged`.
    pub fn install_tree(&mut self, tree: FsTree) -> Result<()> {
        let root = tree
            .root()
            .ok_or(Error::InvalidState("cannot install a tree without a root"))?;
        self.kinds = KindIndex::build(&tree);
        self.zoom.reset(Some(root));
        self.selection = None;
        self.free_space_node = None;
        self.other_space_node = None;
        self.tree = Some(tree);
        self.sync_space_nodes()?;

        debug!(
            "Installed tree with {} nodes and {} kinds",
            self.tree.as_ref().map_or(0, FsTree::len),
            self.kinds.len()
        );
        self.events.emit(DocumentEvent::ItemsChanged);
        Ok(())
    }

    // ── Zoom & selection ────────────────────────────────────────────────────

    /// The item currently zoomed into; the root when not zoomed.
    pub fn zoomed_item(&self) -> Option<NodeIndex> {
        self.zoom.top()
    }

    pub fn zoom_stack(&self) -> &[NodeIndex] {
        self.zoom.items()
    }

    /// Zoom into `node`, which must lie below the zoomed item.
    pub fn zoom_into(&mut self, node: NodeIndex) -> Result<()> {
        let tree = self.tree.as_ref().ok_or(no_tree())?;
        let old = self.zoom.top();
        if self.zoom.zoom_into(tree, node)? {
            self.emit_zoom_change(old);
        }
        Ok(())
    }

    pub fn zoom_out_to(&mut self, node: NodeIndex) -> Result<()> {
        let old = self.zoom.top();
        if self.zoom.zoom_out_to(node)? {
            self.emit_zoom_change(old);
        }
        Ok(())
    }

    /// Zoom out by one level; a no-op when already at the root.
    pub fn zoom_out_one_step(&mut self) {
        let old = self.zoom.top();
        if self.zoom.zoom_out_one_step() {
            self.emit_zoom_change(old);
        }
    }

    pub fn selected(&self) -> Option<NodeIndex> {
        self.selection
    }

    /// Select `node` (or nothing). The node must be part of the tree.
    pub fn set_selected(&mut self, node: Option<NodeIndex>) -> Result<()> {
        if let Some(node) = node {
            self.tree.as_ref().ok_or(no_tree())?.try_node(node)?;
        }
        if node != self.selection {
            let old = std::mem::replace(&mut self.selection, node);
            self.events.emit(DocumentEvent::SelectionChanged { old, new: node });
        }
        Ok(())
    }

    fn emit_zoom_change(&mut self, old: Option<NodeIndex>) {
        self.events.emit(DocumentEvent::ZoomedItemChanged {
            old,
            new: self.zoom.top(),
        });
    }

    // ── Mutations ───────────────────────────────────────────────────────────

    /// Move an item to the trash and drop its subtree from the document.
    ///
    /// The item's statistics are withdrawn first. If the trash refuses, they
    /// are restored and the document is left exactly as it was.
    pub fn move_to_trash(&mut self, node: NodeIndex) -> Result<()> {
        let tree = self.tree.as_mut().ok_or(no_tree())?;
        tree.try_node(node)?;
        if tree.is_special(node) {
            return Err(Error::InvalidState("synthetic items cannot be trashed"));
        }
        let parent = tree
            .parent(node)
            .ok_or(Error::InvalidState("the root item cannot be trashed"))?;
        let path = tree
            .path(node)
            .ok_or(Error::InvalidState("item has no path"))?;

        self.kinds.remove_subtree(tree, node);
        if let Err(source) = self.trash.move_to_trash(&path) {
            self.kinds.add_subtree(tree, node);
            warn!("Could not move {} to the trash: {source}", path.display());
            return Err(Error::TrashFailed { path, source });
        }

        let size = tree.size(node);
        tree.remove_child(parent, node, true)?;
        info!("Moved {} ({}) to the trash", path.display(), format_size(size));

        self.settle_after_change()?;
        self.events.emit(DocumentEvent::ItemsChanged);
        Ok(())
    }

    /// Re-read one item from disk and swap the result into the tree.
    ///
    /// Only the item's subtree is rescanned. An item that no longer exists
    /// is removed. The scan happens before anything is touched, so a failed
    /// rescan leaves the document unchanged.
    pub fn refresh(&mut self, node: NodeIndex) -> Result<()> {
        let tree = self.tree.as_mut().ok_or(no_tree())?;
        tree.try_node(node)?;
        if tree.is_special(node) {
            return Err(Error::InvalidState("synthetic items cannot be refreshed"));
        }
        let path = tree
            .path(node)
            .ok_or(Error::InvalidState("item has no path"))?;

        if fs::symlink_metadata(&path).is_err() {
            let parent = tree.parent(node).ok_or_else(|| Error::InvalidArgument {
                path: path.clone(),
                reason: "the scanned folder no longer exists".into(),
            })?;
            debug!("{} vanished; dropping it", path.display());
            self.kinds.remove_subtree(tree, node);
            tree.remove_child(parent, node, true)?;
            self.settle_after_change()?;
            self.events.emit(DocumentEvent::ItemsChanged);
            return Ok(());
        }

        // The root was scanned as an open folder even when its name marks a
        // package; keep it that way.
        let scanned = if tree.is_root(node) && tree.is_folder(node) {
            scanner::scan_folder(&path, &self.options)?
        } else {
            scanner::scan_item(&path, &self.options)?
        };
        self.replace_subtree(node, scanned)
    }

    /// Swap `node`'s subtree for a separately scanned tree.
    ///
    /// `refresh` uses this after a synchronous rescan; callers that scan in
    /// the background with a [`Scanner`](crate::scanner::Scanner) hand its
    /// result in here. Publishes one `ItemsChanged`.
    pub fn replace_subtree(&mut self, node: NodeIndex, scanned: FsTree) -> Result<()> {
        let new = self.swap_in(node, scanned)?;
        if self.selection == Some(node) {
            self.selection = Some(new);
        }
        self.zoom.replace(node, new);
        self.settle_after_change()?;
        self.events.emit(DocumentEvent::ItemsChanged);
        Ok(())
    }

    /// Graft `scanned` in place of `node` and move the statistics over.
    /// Returns the index the new subtree root received.
    fn swap_in(&mut self, node: NodeIndex, scanned: FsTree) -> Result<NodeIndex> {
        let tree = self.tree.as_mut().ok_or(no_tree())?;
        tree.try_node(node)?;
        if scanned.root().is_none() {
            return Err(Error::InvalidState("replacement tree has no root"));
        }

        self.kinds.remove_subtree(tree, node);
        let new = tree
            .adopt(scanned)
            .ok_or(Error::InvalidState("replacement tree has no root"))?;
        let swapped = match tree.parent(node) {
            Some(parent) => tree.replace_child(parent, node, new, true),
            None => {
                // The old root takes the synthetic space nodes with it.
                self.free_space_node = None;
                self.other_space_node = None;
                tree.replace_root(new)
            }
        };
        if let Err(err) = swapped {
            self.kinds.add_subtree(tree, node);
            return Err(err);
        }
        self.kinds.add_subtree(tree, new);
        Ok(new)
    }

    /// Re-establish the derived state after a structural change: space
    /// nodes reflect the new totals, zoom and selection only name live nodes.
    fn settle_after_change(&mut self) -> Result<()> {
        self.sync_space_nodes()?;
        if let Some(tree) = &self.tree {
            if self.zoom.prune(tree) {
                debug!("Zoom stack pruned to {} entries", self.zoom.len());
            }
            if self.zoom.is_empty() {
                self.zoom.reset(tree.root());
            }
            if self.selection.is_some_and(|s| !tree.contains(s)) {
                self.selection = None;
            }
        }
        Ok(())
    }

    // ── Synthetic space nodes ───────────────────────────────────────────────

    /// Remove any existing space nodes and add the ones currently switched
    /// on, sized from the volume's capacity.
    fn sync_space_nodes(&mut self) -> Result<()> {
        let Some(tree) = self.tree.as_mut() else {
            return Ok(());
        };
        let Some(root) = tree.root() else {
            return Ok(());
        };
        for node in [self.free_space_node.take(), self.other_space_node.take()]
            .into_iter()
            .flatten()
        {
            if tree.parent(node) == Some(root) {
                tree.remove_child(root, node, true)?;
            }
        }

        if !(self.show_free_space || self.show_other_space)
            || !tree.get(root).is_some_and(FsNode::is_container)
        {
            return Ok(());
        }
        let Some(space) = platform::volume_space(tree.base_path()) else {
            warn!("Volume capacity unknown for {}", tree.base_path().display());
            return Ok(());
        };

        if self.show_other_space {
            let scanned = tree.size(root);
            let other = space.used_bytes().checked_sub(scanned).unwrap_or_else(|| {
                warn!(
                    "Scanned total {} exceeds used volume space {}; other space clamped to zero",
                    format_size(scanned),
                    format_size(space.used_bytes())
                );
                0
            });
            let idx = tree.add_node(FsNode::new_other_space(other));
            tree.insert_child(root, idx, true)?;
            self.other_space_node = Some(idx);
        }
        if self.show_free_space {
            let idx = tree.add_node(FsNode::new_free_space(space.free_bytes));
            tree.insert_child(root, idx, true)?;
            self.free_space_node = Some(idx);
        }
        Ok(())
    }

    // ── View options ────────────────────────────────────────────────────────

    pub fn view_option(&self, option: ViewOption) -> bool {
        match option {
            ViewOption::PhysicalFileSize => self.options.use_physical_size,
            ViewOption::PackageContents => self.options.look_into_packages,
            ViewOption::FreeSpace => self.show_free_space,
            ViewOption::OtherSpace => self.show_other_space,
            ViewOption::IgnoreCreatorCode => self.options.ignore_creator_code,
        }
    }

    /// Change one view option, update tree and statistics to match, and
    /// publish one `ViewOptionChanged`. Setting the current value does
    /// nothing.
    ///
    /// Everything that needs the disk is measured before the first change
    /// is made, so a failure leaves the option, the tree and the statistics
    /// as they were.
    pub fn set_view_option(&mut self, option: ViewOption, value: bool) -> Result<()> {
        let old = self.view_option(option);
        if old == value {
            return Ok(());
        }
        match option {
            ViewOption::PhysicalFileSize => {
                let options = ScanOptions {
                    use_physical_size: value,
                    ..self.options
                };
                let staged = self.stage_sizes(&options)?;
                self.options = options;
                self.commit(staged)?;
            }
            ViewOption::PackageContents => {
                let options = ScanOptions {
                    look_into_packages: value,
                    ..self.options
                };
                let staged = self.stage_packages(&options)?;
                self.options = options;
                self.commit(staged)?;
            }
            ViewOption::FreeSpace => self.show_free_space = value,
            ViewOption::OtherSpace => self.show_other_space = value,
            ViewOption::IgnoreCreatorCode => {
                self.options.ignore_creator_code = value;
                self.apply_ignore_creator_code();
            }
        }
        self.settle_after_change()?;
        debug!("View option {option:?} set to {value}");
        self.events.emit(DocumentEvent::ViewOptionChanged {
            option,
            old,
            new: value,
        });
        Ok(())
    }

    pub fn set_use_physical_size(&mut self, value: bool) -> Result<()> {
        self.set_view_option(ViewOption::PhysicalFileSize, value)
    }

    pub fn set_look_into_packages(&mut self, value: bool) -> Result<()> {
        self.set_view_option(ViewOption::PackageContents, value)
    }

    pub fn set_show_free_space(&mut self, value: bool) -> Result<()> {
        self.set_view_option(ViewOption::FreeSpace, value)
    }

    pub fn set_show_other_space(&mut self, value: bool) -> Result<()> {
        self.set_view_option(ViewOption::OtherSpace, value)
    }

    pub fn set_ignore_creator_code(&mut self, value: bool) -> Result<()> {
        self.set_view_option(ViewOption::IgnoreCreatorCode, value)
    }

    /// Re-measure every leaf with `options`' size mode. Files and aliases
    /// cost one `lstat` each; opaque packages are rescanned.
    fn stage_sizes(&self, options: &ScanOptions) -> Result<Staged> {
        let mut staged = Staged::default();
        let Some((tree, root)) = self.tree.as_ref().and_then(|t| Some((t, t.root()?))) else {
            return Ok(staged);
        };
        for leaf in tree.leaf_entries(root) {
            let Some(path) = tree.path(leaf) else {
                continue;
            };
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    staged.drop_vanished(tree, leaf, path)?;
                    continue;
                }
                Err(err) => return Err(Error::loading(&path, err)),
            };
            if tree.is_package(leaf) {
                staged.rescans.push((leaf, scanner::scan_item(&path, options)?));
            } else {
                let size = platform::measured_size(&meta, options.use_physical_size);
                staged.sizes.push((leaf, size));
            }
        }
        Ok(staged)
    }

    /// Rescan every outermost package with `options`' package setting.
    fn stage_packages(&self, options: &ScanOptions) -> Result<Staged> {
        let mut staged = Staged::default();
        let Some((tree, root)) = self.tree.as_ref().and_then(|t| Some((t, t.root()?))) else {
            return Ok(staged);
        };
        let outermost = tree.descendants(root).into_iter().filter(|&n| {
            if n == root || !tree.is_package(n) {
                return false;
            }
            let mut up = tree.parent(n);
            while let Some(p) = up {
                if tree.is_package(p) {
                    return false;
                }
                up = tree.parent(p);
            }
            true
        });
        for package in outermost {
            let Some(path) = tree.path(package) else {
                continue;
            };
            if !path_exists(&path)? {
                staged.drop_vanished(tree, package, path)?;
                continue;
            }
            staged.rescans.push((package, scanner::scan_item(&path, options)?));
        }
        Ok(staged)
    }

    /// Apply measured work. Only structural bookkeeping happens here; the
    /// disk was read while staging.
    fn commit(&mut self, staged: Staged) -> Result<()> {
        for (node, scanned) in staged.rescans {
            let new = self.swap_in(node, scanned)?;
            if self.selection == Some(node) {
                self.selection = Some(new);
            }
            self.zoom.replace(node, new);
        }

        let Some(tree) = self.tree.as_mut() else {
            return Ok(());
        };
        for node in staged.vanished {
            if let Some(parent) = tree.parent(node) {
                self.kinds.remove_subtree(tree, node);
                tree.remove_child(parent, node, false)?;
            }
        }
        for (node, size) in staged.sizes {
            tree.set_leaf_size(node, size);
        }
        if let Some(root) = tree.root() {
            tree.resum_subtree(root);
        }
        self.kinds.recalculate_sizes(tree);
        Ok(())
    }

    fn apply_ignore_creator_code(&mut self) {
        let ignore = self.options.ignore_creator_code;
        if let Some(tree) = self.tree.as_mut() {
            if let Some(root) = tree.root() {
                tree.set_kind_string_including_children(root, true, ignore);
            }
            self.kinds = KindIndex::build(tree);
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// `true` if the item is shown as a container: a folder, or a package
    /// while package contents are shown.
    pub fn is_node(&self, node: NodeIndex) -> bool {
        self.tree.as_ref().is_some_and(|tree| {
            tree.is_folder(node) && (!tree.is_package(node) || self.options.look_into_packages)
        })
    }

    pub fn kind_statistic_for_item(&self, node: NodeIndex) -> Option<&KindStatistic> {
        self.tree
            .as_ref()
            .and_then(|tree| self.kinds.statistic_for(tree, node))
    }

    pub fn kind_statistic_for_kind(&self, kind_name: &str) -> Option<&KindStatistic> {
        self.kinds.get(kind_name)
    }

    /// All statistics, largest total first.
    pub fn kind_statistics(&self) -> Vec<&KindStatistic> {
        self.kinds.sorted_by_size()
    }

    /// Rebuild the statistics from scratch with one traversal.
    pub fn refresh_kind_statistics(&mut self) {
        if let Some(tree) = &self.tree {
            self.kinds = KindIndex::build(tree);
            self.events.emit(DocumentEvent::ItemsChanged);
        }
    }
}

impl ScanObserver for Document {
    fn did_finish(&mut self, tree: FsTree) {
        if let Err(err) = self.install_tree(tree) {
            warn!("Could not install scanned tree: {err}");
        }
    }

    fn did_fail(&mut self, error: crate::error::Error) {
        warn!("Scan failed; keeping the previous tree: {error}");
    }

    fn did_cancel(&mut self) {
        info!("Scan cancelled; keeping the previous tree");
    }
}

fn no_tree() -> Error {
    Error::InvalidState("no tree loaded")
}

/// Disk work measured for a view-option change, waiting to be committed.
#[derive(Default)]
struct Staged {
    /// Subtrees rescanned from disk, with the node each one replaces.
    rescans: Vec<(NodeIndex, FsTree)>,
    /// New measured sizes for files and aliases.
    sizes: Vec<(NodeIndex, u64)>,
    /// Items that disappeared from disk since the scan.
    vanished: Vec<NodeIndex>,
}

impl Staged {
    /// Record a vanished item for removal. The root cannot be dropped.
    fn drop_vanished(&mut self, tree: &FsTree, node: NodeIndex, path: PathBuf) -> Result<()> {
        if tree.parent(node).is_none() {
            return Err(Error::InvalidArgument {
                path,
                reason: "the scanned item no longer exists".into(),
            });
        }
        debug!("{} vanished; dropping it", path.display());
        self.vanished.push(node);
        Ok(())
    }
}

/// `false` only when the path is confirmed missing.
fn path_exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(Error::loading(path, err)),
    }
}
