/// Arena-backed filesystem tree with incremental size propagation.
///
/// All nodes live in a single `Vec<Option<FsNode>>`. Relationships between
/// nodes use `NodeIndex` rather than heap pointers, so the parent link is a
/// plain lookup and a removed subtree simply leaves empty slots behind.
/// Slots are never reused within a session: a stale index can only ever
/// resolve to `None`, never to an unrelated node.
use super::file_node::{Entry, EntryKind, FsNode, NodeIndex, NodeType};
use super::name::compare_filesystem_names;
use crate::error::{Error, Result};
use crate::kinds::kind_name_for;
use crate::platform;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// Display names of the synthetic nodes.
pub const FREE_SPACE_NAME: &str = "Free Space";
pub const OTHER_SPACE_NAME: &str = "Other Space";

/// The tree for one scanned location.
#[derive(Debug, Clone)]
pub struct FsTree {
    /// Arena. `None` marks a removed node.
    nodes: Vec<Option<FsNode>>,

    /// The node standing for `base_path`.
    root: Option<NodeIndex>,

    /// Full path of the root node; every other path is rebuilt from it.
    base_path: PathBuf,

    /// Number of `Some` slots.
    live: usize,
}

impl FsTree {
    /// Create an empty tree for `base_path`. Add a node and call
    /// [`set_root`](Self::set_root) before using path accessors.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(base_path, 0)
    }

    /// Create an empty tree with pre-allocated arena capacity.
    pub fn with_capacity(base_path: impl Into<PathBuf>, estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            root: None,
            base_path: base_path.into(),
            live: 0,
        }
    }

    /// Allocate a detached node in the arena and return its index.
    pub fn add_node(&mut self, mut node: FsNode) -> NodeIndex {
        node.parent = None;
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(Some(node));
        self.live += 1;
        idx
    }

    /// Make a detached node the root of the tree.
    pub fn set_root(&mut self, index: NodeIndex) -> Result<()> {
        let node = self.try_node(index)?;
        if node.parent.is_some() {
            return Err(Error::InvalidState("root node must not have a parent"));
        }
        self.root = Some(index);
        Ok(())
    }

    /// The node standing for the scanned location, once one is set.
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Full path of the root node.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the tree contains no live nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The node at `index`, or `None` for a removed or unknown index.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&FsNode> {
        self.nodes.get(index.idx()).and_then(Option::as_ref)
    }

    #[inline]
    fn get_mut(&mut self, index: NodeIndex) -> Option<&mut FsNode> {
        self.nodes.get_mut(index.idx()).and_then(Option::as_mut)
    }

    /// Mutable access to a node's entry metadata. `None` for synthetic nodes.
    pub(crate) fn get_entry_mut(&mut self, index: NodeIndex) -> Option<&mut Entry> {
        self.get_mut(index).and_then(FsNode::entry_mut)
    }

    /// Like [`get`](Self::get), but a stale index is an [`Error::UnknownNode`].
    pub fn try_node(&self, index: NodeIndex) -> Result<&FsNode> {
        self.get(index).ok_or(Error::UnknownNode(index))
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.get(index).is_some()
    }

    /// Iterate over all live nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &FsNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|node| (NodeIndex::new(i), node)))
    }

    // ── Structure ───────────────────────────────────────────────────────────

    /// `None` for the root and for detached nodes.
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.get(index).and_then(|n| n.parent)
    }

    /// `true` only for the node set with [`set_root`](Self::set_root).
    pub fn is_root(&self, index: NodeIndex) -> bool {
        self.root == Some(index)
    }

    /// The topmost ancestor of `index` (the tree root for attached nodes).
    pub fn root_of(&self, index: NodeIndex) -> NodeIndex {
        let mut current = index;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Direct children in discovery order.
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.get(index).map_or(&[], |n| n.children.as_slice())
    }

    /// Child at `position` in discovery order.
    pub fn child_at(&self, index: NodeIndex, position: usize) -> Option<NodeIndex> {
        self.children(index).get(position).copied()
    }

    pub fn child_count(&self, index: NodeIndex) -> usize {
        self.children(index).len()
    }

    /// `true` if `node` is `ancestor` or lies below it.
    pub fn is_ancestor_or_self(&self, ancestor: NodeIndex, node: NodeIndex) -> bool {
        let mut current = Some(node);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent(idx);
        }
        false
    }

    /// All nodes of the subtree rooted at `index`, parents before children.
    pub fn descendants(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if !self.contains(index) {
            return out;
        }
        let mut stack = vec![index];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            // Reverse so the first child is visited first.
            stack.extend(self.children(idx).iter().rev());
        }
        out
    }

    /// Leaf entries (files, aliases, opaque packages) of the subtree.
    pub fn leaf_entries(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.descendants(index)
            .into_iter()
            .filter(|&idx| self.get(idx).is_some_and(FsNode::is_leaf_entry))
            .collect()
    }

    /// Append `child` to `parent`'s children.
    ///
    /// `child` must be a detached node (freshly added or adopted). With
    /// `update_parent`, `parent` and every ancestor grow by `child`'s size;
    /// without it the caller is responsible for re-summing later (the
    /// scanner finalises each folder as it leaves it).
    pub fn insert_child(
        &mut self,
        parent: NodeIndex,
        child: NodeIndex,
        update_parent: bool,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;

        let size = self.try_node(child)?.size;
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if update_parent {
            self.add_to_ancestors(parent, size, 0);
        }
        Ok(())
    }

    /// Detach `child` from `parent` and drop its whole subtree.
    ///
    /// With `update_parent`, `parent` and every ancestor shrink by `child`'s
    /// size. Fails without touching the tree if `child` is not a current
    /// child of `parent`.
    pub fn remove_child(
        &mut self,
        parent: NodeIndex,
        child: NodeIndex,
        update_parent: bool,
    ) -> Result<()> {
        let position = self.child_position(parent, child)?;
        let size = self.try_node(child)?.size;

        if let Some(node) = self.get_mut(parent) {
            node.children.remove(position);
        }
        self.free_subtree(child);
        if update_parent {
            self.add_to_ancestors(parent, 0, size);
        }
        Ok(())
    }

    /// Swap `old` for the detached node `new`, keeping `old`'s position.
    ///
    /// Both preconditions are checked before anything changes. `old`'s
    /// subtree is dropped. With `update_parent`, the size difference is
    /// applied to `parent` and every ancestor.
    pub fn replace_child(
        &mut self,
        parent: NodeIndex,
        old: NodeIndex,
        new: NodeIndex,
        update_parent: bool,
    ) -> Result<()> {
        let position = self.child_position(parent, old)?;
        self.check_insertable(parent, new)?;

        let old_size = self.try_node(old)?.size;
        let new_size = self.try_node(new)?.size;

        if let Some(node) = self.get_mut(parent) {
            node.children[position] = new;
        }
        if let Some(node) = self.get_mut(new) {
            node.parent = Some(parent);
        }
        self.free_subtree(old);
        if update_parent {
            self.add_to_ancestors(parent, new_size, old_size);
        }
        Ok(())
    }

    /// Replace the root with the detached node `new`, dropping the old tree.
    pub fn replace_root(&mut self, new: NodeIndex) -> Result<()> {
        if self.try_node(new)?.parent.is_some() {
            return Err(Error::InvalidState("new root must be detached"));
        }
        if let Some(old) = self.root.filter(|&old| old != new) {
            self.free_subtree(old);
        }
        self.root = Some(new);
        Ok(())
    }

    /// Recompute the size of one node without enumerating any folder.
    ///
    /// Files and aliases re-read their metadata (one `lstat`). Folders sum
    /// their children's current sizes. Opaque packages and synthetic nodes
    /// keep their measured size; rescan them to re-measure.
    pub fn recalculate_size(
        &mut self,
        index: NodeIndex,
        use_physical_size: bool,
        update_parent: bool,
    ) -> Result<()> {
        let node = self.try_node(index)?;
        let old_size = node.size;

        let new_size = match node.entry().map(|e| e.kind) {
            Some(EntryKind::File | EntryKind::Alias { .. }) => {
                let path = self
                    .path(index)
                    .ok_or(Error::InvalidState("detached node has no path"))?;
                let meta = fs::symlink_metadata(&path).map_err(|e| Error::loading(&path, e))?;
                platform::measured_size(&meta, use_physical_size)
            }
            Some(EntryKind::Folder | EntryKind::Package { expanded: true }) => node
                .children
                .iter()
                .filter_map(|&c| self.get(c))
                .map(|c| c.size)
                .sum(),
            _ => old_size,
        };

        if let Some(node) = self.get_mut(index) {
            node.size = new_size;
        }
        if update_parent && new_size != old_size {
            if let Some(parent) = self.parent(index) {
                self.add_to_ancestors(parent, new_size, old_size);
            }
        }
        Ok(())
    }

    /// Overwrite a leaf's measured size without touching its ancestors.
    /// Containers and synthetic nodes are left alone.
    pub(crate) fn set_leaf_size(&mut self, index: NodeIndex, size: u64) {
        if let Some(node) = self.get_mut(index) {
            if node.is_leaf_entry() {
                node.size = size;
            }
        }
    }

    /// Re-sum every container below and including `index` from its
    /// children's current sizes, children before parents. No filesystem
    /// access.
    pub fn resum_subtree(&mut self, index: NodeIndex) {
        for idx in self.descendants(index).into_iter().rev() {
            let Some(node) = self.get(idx) else { continue };
            if node.is_leaf_entry() || node.is_special() {
                continue;
            }
            let sum = node
                .children
                .iter()
                .filter_map(|&c| self.get(c))
                .map(|c| c.size)
                .sum();
            if let Some(node) = self.get_mut(idx) {
                node.size = sum;
            }
        }
    }

    /// Move every live node of `other` into this arena.
    ///
    /// Returns the index `other`'s root received here, detached and ready for
    /// [`insert_child`](Self::insert_child) or
    /// [`replace_child`](Self::replace_child).
    pub fn adopt(&mut self, other: FsTree) -> Option<NodeIndex> {
        let offset = self.nodes.len();
        let mut remap: Vec<Option<NodeIndex>> = Vec::with_capacity(other.nodes.len());
        let mut next = offset;
        for slot in &other.nodes {
            if slot.is_some() {
                remap.push(Some(NodeIndex::new(next)));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        let map = |idx: NodeIndex| remap.get(idx.idx()).copied().flatten();

        for mut node in other.nodes.into_iter().flatten() {
            node.parent = node.parent.and_then(map);
            node.children = node.children.into_iter().filter_map(map).collect();
            self.nodes.push(Some(node));
            self.live += 1;
        }

        let root = other.root.and_then(map)?;
        if let Some(node) = self.get_mut(root) {
            node.parent = None;
        }
        Some(root)
    }

    /// Walk the whole tree and check that every container's size equals the
    /// sum of its children.
    pub fn size_invariant_holds(&self) -> bool {
        self.iter().all(|(_, node)| {
            if node.is_leaf_entry() || node.is_special() {
                return true;
            }
            let sum: u64 = node
                .children
                .iter()
                .filter_map(|&c| self.get(c))
                .map(|c| c.size)
                .sum();
            sum == node.size
        })
    }

    // ── Metadata accessors ──────────────────────────────────────────────────

    /// Current size in bytes; 0 for an unknown index.
    pub fn size(&self, index: NodeIndex) -> u64 {
        self.get(index).map_or(0, |n| n.size)
    }

    pub fn node_type(&self, index: NodeIndex) -> Option<&NodeType> {
        self.get(index).map(|n| &n.node_type)
    }

    pub fn entry_kind(&self, index: NodeIndex) -> Option<EntryKind> {
        self.get(index).and_then(FsNode::entry).map(|e| e.kind)
    }

    /// `true` for any real directory, packages included. An alias pointing
    /// at a directory is not a folder itself.
    pub fn is_folder(&self, index: NodeIndex) -> bool {
        matches!(
            self.entry_kind(index),
            Some(EntryKind::Folder | EntryKind::Package { .. })
        )
    }

    pub fn is_package(&self, index: NodeIndex) -> bool {
        matches!(self.entry_kind(index), Some(EntryKind::Package { .. }))
    }

    pub fn is_alias(&self, index: NodeIndex) -> bool {
        matches!(self.entry_kind(index), Some(EntryKind::Alias { .. }))
    }

    pub fn is_special(&self, index: NodeIndex) -> bool {
        self.get(index).is_some_and(FsNode::is_special)
    }

    /// Raw file name; empty for synthetic nodes.
    pub fn name(&self, index: NodeIndex) -> &str {
        self.get(index)
            .and_then(FsNode::entry)
            .map_or("", |e| e.name.as_str())
    }

    /// Name shown to the user; synthetic nodes get a fixed label.
    pub fn display_name(&self, index: NodeIndex) -> &str {
        match self.node_type(index) {
            Some(NodeType::Entry(entry)) => entry.name.as_str(),
            Some(NodeType::FreeSpace) => FREE_SPACE_NAME,
            Some(NodeType::OtherSpace) => OTHER_SPACE_NAME,
            None => "",
        }
    }

    /// Full filesystem path. `None` for synthetic and detached nodes.
    pub fn path(&self, index: NodeIndex) -> Option<PathBuf> {
        if self.is_special(index) {
            return None;
        }
        let mut names = Vec::new();
        let mut current = index;
        while !self.is_root(current) {
            names.push(self.name(current));
            current = self.parent(current)?;
        }
        let mut path = self.base_path.clone();
        for name in names.into_iter().rev() {
            path.push(name);
        }
        Some(path)
    }

    /// Path of the folder containing `index`.
    pub fn folder_name(&self, index: NodeIndex) -> Option<PathBuf> {
        self.parent(index).and_then(|p| self.path(p))
    }

    /// Path of `index` relative to `ancestor`, components joined with `/`.
    ///
    /// `ancestor` itself yields its display name. `None` if `index` is not
    /// inside `ancestor`.
    pub fn display_path(&self, index: NodeIndex, ancestor: NodeIndex) -> Option<String> {
        if index == ancestor {
            return Some(self.display_name(ancestor).to_string());
        }
        let mut names = Vec::new();
        let mut current = index;
        while current != ancestor {
            names.push(self.display_name(current));
            current = self.parent(current)?;
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Display path of the folder containing `index`, relative to `ancestor`.
    pub fn display_folder_name(&self, index: NodeIndex, ancestor: NodeIndex) -> Option<String> {
        self.parent(index)
            .and_then(|p| self.display_path(p, ancestor))
    }

    /// `true` if the node's path still resolves (without following aliases).
    pub fn exists(&self, index: NodeIndex) -> bool {
        self.path(index)
            .is_some_and(|p| fs::symlink_metadata(p).is_ok())
    }

    /// Cached kind label, set by [`set_kind_string`](Self::set_kind_string).
    pub fn kind_name(&self, index: NodeIndex) -> Option<&str> {
        self.get(index)
            .and_then(FsNode::entry)
            .and_then(|e| e.kind_name.as_deref())
    }

    /// Classify the node and cache the label. Synthetic nodes have no kind.
    pub fn set_kind_string(&mut self, index: NodeIndex, ignore_creator_code: bool) {
        if let Some(entry) = self.get_mut(index).and_then(FsNode::entry_mut) {
            entry.kind_name = Some(kind_name_for(entry, ignore_creator_code));
        }
    }

    /// Classify `index` and, optionally, its whole subtree.
    pub fn set_kind_string_including_children(
        &mut self,
        index: NodeIndex,
        including_children: bool,
        ignore_creator_code: bool,
    ) {
        if including_children {
            for idx in self.descendants(index) {
                self.set_kind_string(idx, ignore_creator_code);
            }
        } else {
            self.set_kind_string(index, ignore_creator_code);
        }
    }

    // ── Ordering ────────────────────────────────────────────────────────────

    /// Order by size, then by display name.
    pub fn compare_size(&self, a: NodeIndex, b: NodeIndex) -> Ordering {
        self.size(a)
            .cmp(&self.size(b))
            .then_with(|| self.compare_display_name(a, b))
    }

    /// Order by display name using filesystem-name collation.
    pub fn compare_display_name(&self, a: NodeIndex, b: NodeIndex) -> Ordering {
        compare_filesystem_names(self.display_name(a), self.display_name(b))
    }

    /// Children of `index`, largest first.
    pub fn children_sorted_by_size(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut children = self.children(index).to_vec();
        children.sort_by(|&a, &b| self.compare_size(b, a));
        children
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn child_position(&self, parent: NodeIndex, child: NodeIndex) -> Result<usize> {
        self.try_node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(Error::NotFound { parent, child })
    }

    fn check_insertable(&self, parent: NodeIndex, child: NodeIndex) -> Result<()> {
        let parent_node = self.try_node(parent)?;
        let child_node = self.try_node(child)?;
        if !parent_node.is_container() {
            return Err(Error::InvalidState("parent cannot hold children"));
        }
        if child_node.parent.is_some() || self.is_root(child) {
            return Err(Error::InvalidState("node already has a parent"));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::InvalidState("node cannot become its own descendant"));
        }
        Ok(())
    }

    /// Apply `+added - removed` to `start` and all of its ancestors.
    fn add_to_ancestors(&mut self, start: NodeIndex, added: u64, removed: u64) {
        let mut current = Some(start);
        while let Some(idx) = current {
            match self.get_mut(idx) {
                Some(node) => {
                    node.size = node.size.saturating_add(added).saturating_sub(removed);
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    fn free_subtree(&mut self, index: NodeIndex) {
        for idx in self.descendants(index) {
            if let Some(slot) = self.nodes.get_mut(idx.idx()) {
                if slot.take().is_some() {
                    self.live -= 1;
                }
            }
        }
        if self.root == Some(index) {
            self.root = None;
        }
    }
}
