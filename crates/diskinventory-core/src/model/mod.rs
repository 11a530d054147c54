/// Data model for the scanned filesystem tree.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod file_node;
pub mod file_tree;
pub mod name;
pub mod size;

pub use file_node::{Entry, EntryKind, FsNode, NodeIndex, NodeType};
pub use file_tree::{FsTree, FREE_SPACE_NAME, OTHER_SPACE_NAME};
pub use name::compare_filesystem_names;
