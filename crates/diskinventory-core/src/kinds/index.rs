/// Per-kind size and count statistics, maintained incrementally.
///
/// Each [`KindStatistic`] holds back-references (indices) to its member
/// nodes; it never owns them. Adding or removing a member applies that
/// node's size as a delta. A full re-sum only happens on explicit request.
use crate::model::{FsNode, FsTree, NodeIndex};
use compact_str::CompactString;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Count and total size of all files of one kind.
#[derive(Debug, Clone)]
pub struct KindStatistic {
    kind_name: CompactString,
    total_size: u64,
    members: HashSet<NodeIndex>,
}

impl KindStatistic {
    fn new(kind_name: CompactString) -> Self {
        Self {
            kind_name,
            total_size: 0,
            members: HashSet::new(),
        }
    }

    pub fn kind_name(&self) -> &str {
        &self.kind_name
    }

    /// Sum of the members' sizes.
    pub fn size(&self) -> u64 {
        self.total_size
    }

    /// Number of member files.
    pub fn file_count(&self) -> usize {
        self.members.len()
    }

    pub fn items(&self) -> &HashSet<NodeIndex> {
        &self.members
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.members.contains(&index)
    }

    /// Re-sum the members' current sizes. Members no longer in the tree
    /// contribute nothing.
    pub fn recalculate_size(&mut self, tree: &FsTree) {
        self.total_size = self.members.iter().map(|&m| tree.size(m)).sum();
    }

    /// Larger totals first; equal totals ordered by kind name.
    pub fn compare_size_descending(&self, other: &Self) -> Ordering {
        other
            .total_size
            .cmp(&self.total_size)
            .then_with(|| self.kind_name.cmp(&other.kind_name))
    }

    fn insert(&mut self, index: NodeIndex, size: u64) -> bool {
        if self.members.insert(index) {
            self.total_size += size;
            true
        } else {
            false
        }
    }

    fn remove(&mut self, index: NodeIndex, size: u64) -> bool {
        if self.members.remove(&index) {
            self.total_size = self.total_size.saturating_sub(size);
            true
        } else {
            false
        }
    }
}

/// Serializable snapshot of one statistic, for reports.
#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub kind_name: String,
    pub file_count: usize,
    pub total_size: u64,
}

impl From<&KindStatistic> for KindSummary {
    fn from(stat: &KindStatistic) -> Self {
        Self {
            kind_name: stat.kind_name.to_string(),
            file_count: stat.file_count(),
            total_size: stat.total_size,
        }
    }
}

/// Kind name → statistic. Statistics whose last member is removed are
/// pruned, so every entry has at least one member.
#[derive(Debug, Clone, Default)]
pub struct KindIndex {
    stats: HashMap<CompactString, KindStatistic>,
}

impl KindIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index with one traversal over every leaf entry of `tree`.
    pub fn build(tree: &FsTree) -> Self {
        let mut index = Self::new();
        if let Some(root) = tree.root() {
            index.add_subtree(tree, root);
        }
        index
    }

    /// Add `node` to its kind's statistic. Nodes without a kind name
    /// (synthetic nodes, unclassified folders) are ignored.
    ///
    /// Returns `true` if the node was newly added.
    pub fn add_item(&mut self, tree: &FsTree, node: NodeIndex) -> bool {
        let Some(kind) = tree.kind_name(node) else {
            return false;
        };
        let size = tree.size(node);
        self.stats
            .entry(CompactString::new(kind))
            .or_insert_with_key(|k| KindStatistic::new(k.clone()))
            .insert(node, size)
    }

    /// Remove `node` from its kind's statistic, subtracting its current size.
    ///
    /// Returns `true` if the node was a member.
    pub fn remove_item(&mut self, tree: &FsTree, node: NodeIndex) -> bool {
        let Some(kind) = tree.kind_name(node) else {
            return false;
        };
        let size = tree.size(node);
        let Some(stat) = self.stats.get_mut(kind) else {
            return false;
        };
        let removed = stat.remove(node, size);
        if stat.members.is_empty() {
            self.stats.remove(kind);
        }
        removed
    }

    /// Add every leaf entry below (and including) `root`.
    pub fn add_subtree(&mut self, tree: &FsTree, root: NodeIndex) {
        for leaf in tree.leaf_entries(root) {
            self.add_item(tree, leaf);
        }
    }

    /// Remove every leaf entry below (and including) `root`.
    pub fn remove_subtree(&mut self, tree: &FsTree, root: NodeIndex) {
        for leaf in tree.leaf_entries(root) {
            self.remove_item(tree, leaf);
        }
    }

    pub fn get(&self, kind_name: &str) -> Option<&KindStatistic> {
        self.stats.get(kind_name)
    }

    /// The statistic `node` belongs to, if any.
    pub fn statistic_for(&self, tree: &FsTree, node: NodeIndex) -> Option<&KindStatistic> {
        tree.kind_name(node)
            .and_then(|kind| self.stats.get(kind))
            .filter(|stat| stat.contains(node))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindStatistic> {
        self.stats.values()
    }

    /// Sum over all statistics.
    pub fn total_size(&self) -> u64 {
        self.stats.values().map(|s| s.total_size).sum()
    }

    /// Re-sum every statistic from its members' current sizes.
    pub fn recalculate_sizes(&mut self, tree: &FsTree) {
        for stat in self.stats.values_mut() {
            stat.recalculate_size(tree);
        }
    }

    /// Statistics ordered by descending total size, ties by kind name.
    pub fn sorted_by_size(&self) -> Vec<&KindStatistic> {
        let mut stats: Vec<&KindStatistic> = self.stats.values().collect();
        stats.sort_by(|a, b| a.compare_size_descending(b));
        stats
    }

    /// `true` if every statistic's total equals the sum of its members.
    pub fn is_consistent(&self, tree: &FsTree) -> bool {
        self.stats.values().all(|stat| {
            let sum: u64 = stat.members.iter().map(|&m| tree.size(m)).sum();
            sum == stat.total_size
                && stat
                    .members
                    .iter()
                    .all(|&m| tree.get(m).is_some_and(FsNode::is_leaf_entry))
        })
    }
}
