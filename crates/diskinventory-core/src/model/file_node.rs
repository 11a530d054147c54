/// A single node in the arena-allocated filesystem tree.
///
/// Nodes are stored in a flat arena owned by [`FsTree`](super::FsTree).
/// Parent and child links are indices rather than pointers, so the parent
/// back-reference is a plain lookup and ownership flows strictly downward.
use compact_str::CompactString;

/// Lightweight index into the arena.
///
/// Uses `u32` to keep nodes small; supports up to ~4 billion nodes,
/// which is more than enough for any real filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What a real filesystem entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    /// A directory the platform presents as a single document
    /// (e.g. `Foo.app`). Opaque leaves are measured as one unit; expanded
    /// packages hold their contents like a folder.
    Package { expanded: bool },
    /// A symbolic link. Recorded as a leaf with its own size and never
    /// followed; `target_is_dir` is informational only.
    Alias { target_is_dir: bool },
}

/// A node backed by a real path.
#[derive(Debug, Clone)]
pub struct Entry {
    /// File or directory name only (NOT the full path). The tree root keeps
    /// the last component of the scanned path; full paths are rebuilt from
    /// [`FsTree::base_path`](super::FsTree::base_path).
    pub name: CompactString,
    pub kind: EntryKind,
    /// Cached kind label, see [`crate::kinds::kind_name_for`].
    pub kind_name: Option<CompactString>,
    /// Owner-executable bit, used for kind classification.
    pub executable: bool,
    /// `true` if the folder could not be enumerated and was kept empty.
    pub unreadable: bool,
}

/// The three kinds of tree node.
///
/// `OtherSpace` and `FreeSpace` are synthetic: childless, owned by the root,
/// and never backed by a path.
#[derive(Debug, Clone)]
pub enum NodeType {
    Entry(Entry),
    /// Space on the volume used by everything outside the scanned folder.
    OtherSpace,
    /// Free space on the volume.
    FreeSpace,
}

/// A single node in the tree.
#[derive(Debug, Clone)]
pub struct FsNode {
    pub node_type: NodeType,

    /// Accumulated size in bytes (logical or physical, per scan options).
    /// Interior nodes hold the sum of their children's sizes.
    pub size: u64,

    /// `None` for the root and for detached nodes.
    pub parent: Option<NodeIndex>,

    /// Children in discovery order.
    pub children: Vec<NodeIndex>,
}

impl FsNode {
    /// Create a leaf entry (file, alias, or opaque package) with a measured size.
    pub fn new_leaf(name: CompactString, kind: EntryKind, size: u64) -> Self {
        Self {
            node_type: NodeType::Entry(Entry {
                name,
                kind,
                kind_name: None,
                executable: false,
                unreadable: false,
            }),
            size,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create an empty folder (or expanded package) entry. Its size grows as
    /// children are inserted.
    pub fn new_folder(name: CompactString, kind: EntryKind) -> Self {
        Self::new_leaf(name, kind, 0)
    }

    /// Create a synthetic free-space node.
    pub fn new_free_space(size: u64) -> Self {
        Self::synthetic(NodeType::FreeSpace, size)
    }

    /// Create a synthetic other-space node.
    pub fn new_other_space(size: u64) -> Self {
        Self::synthetic(NodeType::OtherSpace, size)
    }

    fn synthetic(node_type: NodeType, size: u64) -> Self {
        Self {
            node_type,
            size,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn entry(&self) -> Option<&Entry> {
        match &self.node_type {
            NodeType::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn entry_mut(&mut self) -> Option<&mut Entry> {
        match &mut self.node_type {
            NodeType::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// `true` for the synthetic free/other space nodes.
    pub fn is_special(&self) -> bool {
        !matches!(self.node_type, NodeType::Entry(_))
    }

    /// `true` if the node may own children (folders and expanded packages).
    pub fn is_container(&self) -> bool {
        matches!(
            self.entry().map(|e| e.kind),
            Some(EntryKind::Folder | EntryKind::Package { expanded: true })
        )
    }

    /// `true` if this node holds a measured size rather than a sum:
    /// files, aliases, and packages that were not looked into.
    pub fn is_leaf_entry(&self) -> bool {
        matches!(
            self.entry().map(|e| e.kind),
            Some(EntryKind::File | EntryKind::Alias { .. } | EntryKind::Package { expanded: false })
        )
    }
}
