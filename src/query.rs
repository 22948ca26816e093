// src/query.rs - Read-only traversal of the alarm tree
//
// Nothing in here mutates the tree. Depth-first walks visit the subtree
// children of a node (in insertion order, each fully) before the node's own
// process variables (in insertion order), matching `children()`.
use serde::Serialize;

use crate::node::{AlarmTreeNode, ConfigurationKind, NodeId, NodeVariant};
use crate::severity::Severity;
use crate::tree::AlarmTree;

/// Point-in-time overview of a node and everything below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    /// Node name
    pub name: String,
    /// Node kind
    pub kind: ConfigurationKind,
    /// Active severity of the node
    pub alarm_severity: Severity,
    /// Unacknowledged severity of the node
    pub unacknowledged_alarm_severity: Severity,
    /// Subtrees below the node, not counting the node itself
    pub subtree_count: usize,
    /// Process variables at or below the node
    pub process_variable_count: usize,
    /// Process variables whose active severity is an alarm
    pub alarm_count: usize,
    /// Process variables whose unacknowledged severity is an alarm
    pub unacknowledged_count: usize,
}

impl AlarmTree {
    /// Active severity of a node, `None` for stale handles
    pub fn alarm_severity(&self, id: NodeId) -> Option<Severity> {
        self.get(id).map(AlarmTreeNode::alarm_severity)
    }

    /// Unacknowledged severity of a node, `None` for stale handles
    pub fn unacknowledged_alarm_severity(&self, id: NodeId) -> Option<Severity> {
        self.get(id).map(AlarmTreeNode::unacknowledged_alarm_severity)
    }

    /// True if either aggregate of the node is in alarm
    pub fn has_alarm(&self, id: NodeId) -> bool {
        self.get(id).map_or(false, AlarmTreeNode::has_alarm)
    }

    /// True if `id` is a subtree with at least one child
    pub fn has_children(&self, id: NodeId) -> bool {
        self.get(id)
            .and_then(AlarmTreeNode::as_subtree)
            .map_or(false, |subtree| !subtree.is_empty())
    }

    /// Direct children: subtrees first, then process variables, each group
    /// in insertion order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .and_then(AlarmTreeNode::as_subtree)
            .map(|subtree| subtree.children().collect())
            .unwrap_or_default()
    }

    /// Direct child called `name`, in either namespace
    pub fn get_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?.as_subtree()?.child(name)
    }

    /// Every process variable called `name` at or below `id`
    ///
    /// The same name may appear at several places in the tree; each
    /// occurrence is reported once.
    pub fn find_process_variable_nodes(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_process_variables(id, &mut |leaf, node| {
            if node.name == name {
                found.push(leaf);
            }
        });
        found
    }

    /// All process variables at or below `id`
    pub fn find_all_process_variable_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_process_variables(id, &mut |leaf, _| found.push(leaf));
        found
    }

    /// Process variables at or below `id` whose unacknowledged severity is an
    /// alarm
    ///
    /// Leaves still at `Unknown` (never updated) are not reported, only
    /// levels above `NoAlarm` count.
    pub fn collect_unacknowledged_alarms(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_process_variables(id, &mut |leaf, node| {
            if node.unacknowledged_alarm_severity().is_alarm() {
                found.push(leaf);
            }
        });
        found
    }

    /// Names from below the root down to `id`; empty for the root itself
    ///
    /// Returns `None` for stale handles and for nodes not connected to the
    /// root.
    pub fn path(&self, id: NodeId) -> Option<Vec<String>> {
        let mut names = Vec::new();
        let mut cursor = id;
        while cursor != self.root() {
            let node = self.get(cursor)?;
            names.push(node.name.clone());
            cursor = node.parent?;
        }
        names.reverse();
        Some(names)
    }

    /// Resolve a path as produced by [`path`](Self::path)
    pub fn find_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, name| self.get_child(node, name.as_ref()))
    }

    /// Counts and aggregates for `id`, `None` for stale handles
    pub fn summary(&self, id: NodeId) -> Option<TreeSummary> {
        let node = self.get(id)?;
        let mut summary = TreeSummary {
            name: node.name.clone(),
            kind: node.kind,
            alarm_severity: node.alarm_severity(),
            unacknowledged_alarm_severity: node.unacknowledged_alarm_severity(),
            subtree_count: 0,
            process_variable_count: 0,
            alarm_count: 0,
            unacknowledged_count: 0,
        };

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else { continue };
            match &node.variant {
                NodeVariant::Subtree(subtree) => {
                    if current != id {
                        summary.subtree_count += 1;
                    }
                    stack.extend(subtree.children());
                }
                NodeVariant::ProcessVariable(pv) => {
                    summary.process_variable_count += 1;
                    if pv.alarm_severity().is_alarm() {
                        summary.alarm_count += 1;
                    }
                    if pv.unacknowledged_alarm_severity().is_alarm() {
                        summary.unacknowledged_count += 1;
                    }
                }
            }
        }
        Some(summary)
    }

    fn walk_process_variables<F>(&self, id: NodeId, visit: &mut F)
    where
        F: FnMut(NodeId, &AlarmTreeNode),
    {
        // Children are pushed in reverse so they pop in walk order
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else { continue };
            match &node.variant {
                NodeVariant::ProcessVariable(_) => visit(current, node),
                NodeVariant::Subtree(subtree) => {
                    let leaves: Vec<NodeId> = subtree.process_variable_children().collect();
                    let subtrees: Vec<NodeId> = subtree.subtree_children().collect();
                    stack.extend(leaves.into_iter().rev());
                    stack.extend(subtrees.into_iter().rev());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{ProcessVariableBuilder, SubtreeBuilder};
    use crate::node::{ConfigurationKind, NodeId, TreeNodeSource};
    use crate::severity::Severity;
    use crate::tree::AlarmTree;

    fn sample() -> (AlarmTree, NodeId, NodeId) {
        let mut tree = AlarmTree::new("root");
        let root = tree.root();
        let a = SubtreeBuilder::new("A", ConfigurationKind::Facility, TreeNodeSource::Runtime)
            .parent(root)
            .build(&mut tree)
            .unwrap();
        let b = SubtreeBuilder::new("B", ConfigurationKind::Component, TreeNodeSource::Runtime)
            .parent(a)
            .build(&mut tree)
            .unwrap();
        for (parent, name, s) in [
            (root, "shared", Severity::Minor),
            (a, "a1", Severity::NoAlarm),
            (b, "shared", Severity::Major),
            (b, "b1", Severity::Unknown),
        ] {
            ProcessVariableBuilder::new(name, TreeNodeSource::Runtime)
                .severities(s, s)
                .parent(parent)
                .build(&mut tree)
                .unwrap();
        }
        (tree, a, b)
    }

    fn names(tree: &AlarmTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.path(*id).unwrap().join("/")).collect()
    }

    #[test]
    fn test_children_order() {
        let (tree, a, _) = sample();
        let children = tree.children(tree.root());
        assert_eq!(names(&tree, &children), vec!["A", "shared"]);
        assert_eq!(names(&tree, &tree.children(a)), vec!["A/B", "A/a1"]);
    }

    #[test]
    fn test_find_by_name_reports_every_occurrence() {
        let (tree, _, _) = sample();
        let found = tree.find_process_variable_nodes(tree.root(), "shared");
        assert_eq!(names(&tree, &found), vec!["A/B/shared", "shared"]);
        assert!(tree.find_process_variable_nodes(tree.root(), "missing").is_empty());
    }

    #[test]
    fn test_flatten_order_is_depth_first() {
        let (tree, _, _) = sample();
        let all = tree.find_all_process_variable_nodes(tree.root());
        assert_eq!(names(&tree, &all), vec!["A/B/shared", "A/B/b1", "A/a1", "shared"]);
    }

    #[test]
    fn test_collect_unacknowledged_skips_baseline() {
        let (tree, _, b) = sample();
        let pending = tree.collect_unacknowledged_alarms(tree.root());
        assert_eq!(names(&tree, &pending), vec!["A/B/shared", "shared"]);
        assert_eq!(tree.collect_unacknowledged_alarms(b).len(), 1);
    }

    #[test]
    fn test_path_round_trip() {
        let (tree, _, b) = sample();
        assert_eq!(tree.path(b).unwrap(), vec!["A", "B"]);
        assert_eq!(tree.find_by_path(&["A", "B"]), Some(b));
        assert_eq!(tree.find_by_path::<&str>(&[]), Some(tree.root()));
        assert_eq!(tree.find_by_path(&["A", "nope"]), None);
    }

    #[test]
    fn test_summary_counts() {
        let (tree, _, _) = sample();
        let summary = tree.summary(tree.root()).unwrap();
        assert_eq!(summary.subtree_count, 2);
        assert_eq!(summary.process_variable_count, 4);
        assert_eq!(summary.alarm_count, 2);
        assert_eq!(summary.unacknowledged_count, 2);
        assert_eq!(summary.alarm_severity, Severity::Major);
    }

    #[test]
    fn test_get_child_and_has_children() {
        let (tree, a, b) = sample();
        assert_eq!(tree.get_child(a, "B"), Some(b));
        assert_eq!(tree.get_child(a, "zzz"), None);
        assert!(tree.has_children(a));
        let leaf = tree.get_child(a, "a1").unwrap();
        assert!(!tree.has_children(leaf));
        assert_eq!(tree.get_child(leaf, "anything"), None);
    }
}
