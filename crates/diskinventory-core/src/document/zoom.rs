/// The zoom stack: the chain of items the user has zoomed into.
///
/// The bottom entry is always the tree root and each entry is an
/// ancestor-or-self of the one above it. The top is the "zoomed item".
use crate::error::{Error, Result};
use crate::model::{FsTree, NodeIndex};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoomStack {
    items: Vec<NodeIndex>,
}

impl ZoomStack {
    /// A stack holding only `root`.
    pub fn new(root: NodeIndex) -> Self {
        Self { items: vec![root] }
    }

    pub fn reset(&mut self, root: Option<NodeIndex>) {
        self.items.clear();
        self.items.extend(root);
    }

    /// The zoomed item.
    pub fn top(&self) -> Option<NodeIndex> {
        self.items.last().copied()
    }

    pub fn items(&self) -> &[NodeIndex] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Push `node`, which must lie inside the zoomed item. Zooming into the
    /// zoomed item itself changes nothing.
    ///
    /// Returns `true` if the stack changed.
    pub fn zoom_into(&mut self, tree: &FsTree, node: NodeIndex) -> Result<bool> {
        tree.try_node(node)?;
        let top = self
            .top()
            .ok_or(Error::InvalidState("zoom stack is empty"))?;
        if node == top {
            return Ok(false);
        }
        if !tree.is_ancestor_or_self(top, node) {
            return Err(Error::InvalidZoomTarget {
                target: node,
                zoomed: top,
            });
        }
        self.items.push(node);
        Ok(true)
    }

    /// Pop entries until `node` is on top. `node` must be on the stack.
    pub fn zoom_out_to(&mut self, node: NodeIndex) -> Result<bool> {
        let top = self
            .top()
            .ok_or(Error::InvalidState("zoom stack is empty"))?;
        let position = self
            .items
            .iter()
            .position(|&item| item == node)
            .ok_or(Error::InvalidZoomTarget {
                target: node,
                zoomed: top,
            })?;
        let changed = position + 1 != self.items.len();
        self.items.truncate(position + 1);
        Ok(changed)
    }

    /// Pop one entry. The root is never popped.
    pub fn zoom_out_one_step(&mut self) -> bool {
        if self.items.len() > 1 {
            self.items.pop();
            true
        } else {
            false
        }
    }

    /// Substitute `new` for `old` after a subtree swap. Entries above `old`
    /// belonged to the discarded subtree and are dropped.
    pub fn replace(&mut self, old: NodeIndex, new: NodeIndex) {
        if let Some(position) = self.items.iter().position(|&item| item == old) {
            self.items[position] = new;
            self.items.truncate(position + 1);
        }
    }

    /// Drop every entry from the first one no longer in `tree` upward.
    ///
    /// Returns `true` if anything was dropped.
    pub fn prune(&mut self, tree: &FsTree) -> bool {
        match self.items.iter().position(|&item| !tree.contains(item)) {
            Some(position) => {
                self.items.truncate(position);
                true
            }
            None => false,
        }
    }

    /// `true` if each entry is an ancestor-or-self of the entry above it.
    pub fn is_consistent(&self, tree: &FsTree) -> bool {
        self.items
            .windows(2)
            .all(|pair| tree.is_ancestor_or_self(pair[0], pair[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{EntryKind, FsNode};
    use compact_str::CompactString;

    /// root ─┬─ a ── a1
    ///       └─ b
    fn tree() -> (FsTree, [NodeIndex; 4]) {
        let mut tree = FsTree::new("/z");
        let folder = |name: &str| FsNode::new_folder(CompactString::new(name), EntryKind::Folder);
        let root = tree.add_node(folder("z"));
        tree.set_root(root).unwrap();
        let a = tree.add_node(folder("a"));
        let a1 = tree.add_node(folder("a1"));
        let b = tree.add_node(folder("b"));
        tree.insert_child(root, a, true).unwrap();
        tree.insert_child(a, a1, true).unwrap();
        tree.insert_child(root, b, true).unwrap();
        (tree, [root, a, a1, b])
    }

    #[test]
    fn zoom_into_descendant_and_back_out() {
        let (tree, [root, a, a1, _]) = tree();
        let mut zoom = ZoomStack::new(root);
        assert!(zoom.zoom_into(&tree, a).unwrap());
        assert!(zoom.zoom_into(&tree, a1).unwrap());
        assert!(zoom.is_consistent(&tree));
        assert_eq!(zoom.top(), Some(a1));

        assert!(zoom.zoom_out_one_step());
        assert_eq!(zoom.top(), Some(a));
        assert!(zoom.zoom_out_to(root).unwrap());
        assert_eq!(zoom.items(), &[root]);
    }

    #[test]
    fn zoom_into_sibling_is_rejected() {
        let (tree, [root, a, _, b]) = tree();
        let mut zoom = ZoomStack::new(root);
        zoom.zoom_into(&tree, a).unwrap();
        let err = zoom.zoom_into(&tree, b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidZoomTarget);
        assert_eq!(zoom.items(), &[root, a]);
    }

    #[test]
    fn zooming_into_top_is_a_no_op() {
        let (tree, [root, ..]) = tree();
        let mut zoom = ZoomStack::new(root);
        assert!(!zoom.zoom_into(&tree, root).unwrap());
        assert_eq!(zoom.len(), 1);
    }

    #[test]
    fn root_is_never_popped() {
        let (_, [root, ..]) = tree();
        let mut zoom = ZoomStack::new(root);
        assert!(!zoom.zoom_out_one_step());
        assert_eq!(zoom.top(), Some(root));
    }

    #[test]
    fn zoom_out_to_unknown_entry_fails() {
        let (tree, [root, a, _, b]) = tree();
        let mut zoom = ZoomStack::new(root);
        zoom.zoom_into(&tree, a).unwrap();
        assert_eq!(
            zoom.zoom_out_to(b).unwrap_err().kind(),
            ErrorKind::InvalidZoomTarget
        );
    }

    #[test]
    fn prune_drops_removed_entries() {
        let (mut tree, [root, a, a1, _]) = tree();
        let mut zoom = ZoomStack::new(root);
        zoom.zoom_into(&tree, a).unwrap();
        zoom.zoom_into(&tree, a1).unwrap();
        tree.remove_child(root, a, true).unwrap();
        assert!(zoom.prune(&tree));
        assert_eq!(zoom.items(), &[root]);
    }
}
