// src/tree.rs - Node arena and incremental severity propagation
//
// Every node lives in a slot of the arena below. Parents own their children
// through the name maps of their SubtreeNode; children refer back to their
// parent by handle only. Removing a node frees its slot (and those of all its
// descendants) and bumps the slot generation so stale handles stop resolving.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Result, TreeError};
use crate::node::{
    AlarmTreeNode, ConfigurationKind, NodeVariant, ProcessVariableNode, SubtreeNode, TreeNodeSource,
};
use crate::severity::Severity;

pub use crate::node::NodeId;

/// Work counters, mainly useful to check how far updates travel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Leaf severity writes
    pub severity_updates: u64,
    /// Subtrees that folded in a child change
    pub propagation_steps: u64,
    /// Full scans over the direct children of a subtree, per channel
    pub rescans: u64,
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Active,
    Unacknowledged,
}

impl Channel {
    fn of(self, node: &AlarmTreeNode) -> Severity {
        match self {
            Channel::Active => node.alarm_severity(),
            Channel::Unacknowledged => node.unacknowledged_alarm_severity(),
        }
    }

    fn cached(self, subtree: &SubtreeNode) -> Severity {
        match self {
            Channel::Active => subtree.highest_active,
            Channel::Unacknowledged => subtree.highest_unacknowledged,
        }
    }

    fn store(self, subtree: &mut SubtreeNode, severity: Severity) {
        match self {
            Channel::Active => subtree.highest_active = severity,
            Channel::Unacknowledged => subtree.highest_unacknowledged = severity,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<AlarmTreeNode>,
}

/// The alarm tree: an arena of nodes below a single root subtree
///
/// All mutation goes through `&mut self`, so a single owner serializes every
/// write. Wrap the tree in [`SharedAlarmTree`](crate::SharedAlarmTree) to
/// share it between a writer and concurrent readers.
///
/// # Examples
///
/// ```rust
/// use alarmtree::{AlarmTree, ConfigurationKind, Severity, SubtreeBuilder, TreeNodeSource};
///
/// let mut tree = AlarmTree::new("Alarm Tree");
/// let area = SubtreeBuilder::new("Cryo", ConfigurationKind::Facility, TreeNodeSource::ConfigFile)
///     .parent(tree.root())
///     .build(&mut tree)?;
/// let pv = tree.create_process_variable("cryo:temp", TreeNodeSource::ConfigFile);
/// tree.add_child(area, pv)?;
///
/// tree.set_severities(pv, Severity::Major, Severity::Major, None)?;
/// assert_eq!(tree.alarm_severity(tree.root()), Some(Severity::Major));
/// # Ok::<(), alarmtree::TreeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct AlarmTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
    stats: TreeStats,
}

impl AlarmTree {
    /// Create a tree holding only a root subtree named `root_name`
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            live: 0,
            stats: TreeStats::default(),
        };
        tree.root = tree.insert(AlarmTreeNode::subtree(
            root_name.into(),
            ConfigurationKind::Root,
            TreeNodeSource::Root,
        ));
        tree
    }

    /// Handle of the root subtree
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including detached ones
    pub fn len(&self) -> usize {
        self.live
    }

    /// Always false; the root cannot be removed
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Resolve a handle
    pub fn get(&self, id: NodeId) -> Option<&AlarmTreeNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// True if the handle still resolves
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Work counters accumulated since creation or the last reset
    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    /// Zero the work counters
    pub fn reset_stats(&mut self) {
        self.stats = TreeStats::default();
    }

    // ------------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------------

    /// Create a detached process variable node
    ///
    /// Both severities start at [`Severity::lowest`]. Attach it with
    /// [`add_child`](Self::add_child).
    pub fn create_process_variable(&mut self, name: impl Into<String>, source: TreeNodeSource) -> NodeId {
        self.insert(AlarmTreeNode::process_variable(name.into(), source))
    }

    /// Create a detached subtree node; the builder normalizes `kind` first
    pub(crate) fn create_subtree(
        &mut self,
        name: String,
        kind: ConfigurationKind,
        source: TreeNodeSource,
    ) -> NodeId {
        self.insert(AlarmTreeNode::subtree(name, kind, source))
    }

    /// Drop a node that was never attached, together with its descendants
    pub(crate) fn discard_detached(&mut self, id: NodeId) {
        if id != self.root && self.get(id).map_or(false, |n| n.parent.is_none()) {
            self.release_recursive(id);
        }
    }

    // ------------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------------

    /// Attach the detached node `child` below the subtree `parent`
    ///
    /// Fails without touching the tree if a sibling already uses the child's
    /// name (in either namespace), if `child` is attached elsewhere, is the
    /// root or an ancestor of `parent`, or if `parent` is a leaf. On success
    /// the child's severities are folded into `parent` and propagated upward.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_placement(parent, child)?;
        let node = self.node(child)?;
        if node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(node.name.clone()));
        }
        self.attach(parent, child)
    }

    /// Remove the direct child called `name` and free it with all its
    /// descendants
    ///
    /// Removing a name that is not present is a no-op. The remaining children
    /// are rescanned because a removal can only lower the aggregate.
    pub fn remove_child(&mut self, parent: NodeId, name: &str) -> Result<()> {
        let removed = self.subtree_mut(parent)?.detach(name);
        if let Some(child) = removed {
            self.release_recursive(child);
            debug!("Removed '{}' from '{}'", name, self.node(parent)?.name);
        }
        self.refresh(parent)
    }

    /// Remove every child of `parent`, clearing nested subtrees depth-first
    pub fn remove_children(&mut self, parent: NodeId) -> Result<()> {
        self.subtree(parent)?;

        // Pre-order; walked backwards every subtree is emptied before its parent
        let mut order = Vec::new();
        let mut stack = vec![parent];
        while let Some(id) = stack.pop() {
            if let Some(subtree) = self.get(id).and_then(AlarmTreeNode::as_subtree) {
                stack.extend(subtree.subtree_children());
                order.push(id);
            }
        }

        for subtree in order.into_iter().rev() {
            let names: Vec<String> = self
                .subtree(subtree)?
                .children()
                .filter_map(|child| self.get(child))
                .map(|child| child.name.clone())
                .collect();
            for name in names {
                self.remove_child(subtree, &name)?;
            }
        }
        Ok(())
    }

    /// Drop all children at once and reset the aggregates to the baseline
    ///
    /// Meant for rebuilding a subtree from scratch. Ancestors are updated if
    /// the reset lowered this node's severities.
    pub fn clear_children(&mut self, parent: NodeId) -> Result<()> {
        let subtree = self.subtree_mut(parent)?;
        let children: Vec<NodeId> = subtree.children().collect();
        let was_baseline = subtree.highest_active == Severity::lowest()
            && subtree.highest_unacknowledged == Severity::lowest();
        subtree.subtrees.clear();
        subtree.process_variables.clear();
        subtree.reset_severities();

        for child in children {
            self.release_recursive(child);
        }
        debug!("Cleared children of '{}'", self.node(parent)?.name);

        match self.node(parent)?.parent {
            Some(grandparent) if !was_baseline => self.propagate(grandparent, parent),
            _ => Ok(()),
        }
    }

    /// Move an attached or detached node below `new_parent`
    ///
    /// The placement is validated before anything changes; on failure the
    /// node stays where it was. Moving a node to its current parent is a
    /// no-op.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        let (name, old_parent) = {
            let n = self.node(node)?;
            (n.name.clone(), n.parent)
        };
        if old_parent == Some(new_parent) {
            self.subtree(new_parent)?;
            return Ok(());
        }
        self.check_placement(new_parent, node)?;

        if let Some(old_parent) = old_parent {
            self.subtree_mut(old_parent)?.detach(&name);
            self.node_mut(node)?.parent = None;
            self.refresh(old_parent)?;
        }
        debug!("Moving '{}' to '{}'", name, self.node(new_parent)?.name);
        self.attach(new_parent, node)
    }

    // ------------------------------------------------------------------------
    // Severity input
    // ------------------------------------------------------------------------

    /// Store new severities on a process variable and propagate the change
    ///
    /// Subtree severities are derived from their children, so writing to a
    /// subtree fails with [`TreeError::NotAProcessVariable`].
    pub fn set_severities(
        &mut self,
        leaf: NodeId,
        active: Severity,
        unacknowledged: Severity,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let node = self.node_mut(leaf)?;
        let parent = node.parent;
        let AlarmTreeNode { name, variant, .. } = node;
        let NodeVariant::ProcessVariable(pv) = variant else {
            return Err(TreeError::NotAProcessVariable(name.clone()));
        };

        let changed = pv.active != active || pv.unacknowledged != unacknowledged;
        pv.active = active;
        pv.unacknowledged = unacknowledged;
        if timestamp.is_some() {
            pv.last_update = timestamp;
        }
        trace!("'{}' -> active {} / unacknowledged {}", name, active, unacknowledged);
        self.stats.severity_updates += 1;

        match parent {
            Some(parent) if changed => self.propagate(parent, leaf),
            _ => Ok(()),
        }
    }

    /// Change only the active severity, keeping the unacknowledged one
    pub fn set_alarm_severity(&mut self, leaf: NodeId, active: Severity) -> Result<()> {
        let unacknowledged = self.leaf(leaf)?.unacknowledged_alarm_severity();
        self.set_severities(leaf, active, unacknowledged, None)
    }

    /// Operator acknowledgement of a process variable
    ///
    /// Clears the unacknowledged severity to `NoAlarm` while the active
    /// severity stays as reported. Returns false if there was nothing to
    /// acknowledge.
    pub fn acknowledge(&mut self, leaf: NodeId) -> Result<bool> {
        let pv = self.leaf(leaf)?;
        if !pv.unacknowledged_alarm_severity().is_alarm() {
            return Ok(false);
        }
        let active = pv.alarm_severity();
        self.set_severities(leaf, active, Severity::NoAlarm, None)?;
        Ok(true)
    }

    /// Acknowledge every unacknowledged process variable at or below `node`
    pub fn acknowledge_all(&mut self, node: NodeId) -> Result<usize> {
        let pending = self.collect_unacknowledged_alarms(node);
        let mut acknowledged = 0;
        for leaf in pending {
            if self.acknowledge(leaf)? {
                acknowledged += 1;
            }
        }
        Ok(acknowledged)
    }

    /// Fold the current severities of `child` into `parent` and forward the
    /// change as far up as it alters an aggregate
    ///
    /// Leaf writes already do this through
    /// [`set_severities`](Self::set_severities). `child` must be a direct
    /// child of `parent`, otherwise [`TreeError::NotAChild`] is returned and
    /// nothing changes.
    pub fn child_severity_changed(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let child_node = self.node(child)?;
        if child_node.parent != Some(parent) {
            return Err(TreeError::NotAChild {
                parent: self.node(parent)?.name.clone(),
                child: child_node.name.clone(),
            });
        }
        self.propagate(parent, child)
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    fn propagate(&mut self, mut parent: NodeId, mut child: NodeId) -> Result<()> {
        loop {
            if !self.fold_child(parent, child)? {
                trace!("Propagation stopped at '{}'", self.node(parent)?.name);
                return Ok(());
            }
            match self.node(parent)?.parent {
                Some(grandparent) => {
                    child = parent;
                    parent = grandparent;
                }
                None => return Ok(()),
            }
        }
    }

    /// One step of the incremental update. A value above the cached one is
    /// adopted directly; anything else could have lowered the maximum, so the
    /// children are rescanned. Ties go through the rescan as well.
    fn fold_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.stats.propagation_steps += 1;
        let mut changed = false;
        for channel in [Channel::Active, Channel::Unacknowledged] {
            let reported = channel.of(self.node(child)?);
            let cached = channel.cached(self.subtree(parent)?);
            let updated = if reported.level() > cached.level() {
                reported
            } else {
                self.highest_child_severity(parent, channel)?
            };
            if updated != cached {
                channel.store(self.subtree_mut(parent)?, updated);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Full rescan of both channels, then propagate if anything moved
    fn refresh(&mut self, parent: NodeId) -> Result<()> {
        let mut changed = false;
        for channel in [Channel::Active, Channel::Unacknowledged] {
            let highest = self.highest_child_severity(parent, channel)?;
            let subtree = self.subtree_mut(parent)?;
            if channel.cached(subtree) != highest {
                channel.store(subtree, highest);
                changed = true;
            }
        }
        match self.node(parent)?.parent {
            Some(grandparent) if changed => self.propagate(grandparent, parent),
            _ => Ok(()),
        }
    }

    fn highest_child_severity(&mut self, parent: NodeId, channel: Channel) -> Result<Severity> {
        self.stats.rescans += 1;
        let subtree = self.subtree(parent)?;
        Ok(Severity::highest(
            subtree
                .children()
                .filter_map(|id| self.get(id))
                .map(|child| channel.of(child)),
        ))
    }

    // ------------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------------

    fn check_placement(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == self.root {
            return Err(TreeError::RootNode);
        }
        let child_node = self.node(child)?;
        let parent_node = self.node(parent)?;
        let subtree = parent_node
            .as_subtree()
            .ok_or_else(|| TreeError::NotASubtree(parent_node.name.clone()))?;
        if subtree.contains(&child_node.name) {
            return Err(TreeError::DuplicateName {
                parent: parent_node.name.clone(),
                name: child_node.name.clone(),
            });
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::WouldCreateCycle {
                    parent: parent_node.name.clone(),
                    child: child_node.name.clone(),
                });
            }
            cursor = self.get(id).and_then(|n| n.parent);
        }
        Ok(())
    }

    /// Insert a validated, detached child and fold it in
    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let (name, is_leaf) = {
            let node = self.node(child)?;
            (node.name.clone(), node.is_process_variable())
        };
        let subtree = self.subtree_mut(parent)?;
        if is_leaf {
            subtree.process_variables.insert(name, child);
        } else {
            subtree.subtrees.insert(name, child);
        }
        self.node_mut(child)?.parent = Some(parent);
        self.propagate(parent, child)
    }

    fn insert(&mut self, node: AlarmTreeNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<AlarmTreeNode> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    fn release_recursive(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.release(id) {
                if let NodeVariant::Subtree(subtree) = node.variant {
                    stack.extend(subtree.children());
                }
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&AlarmTreeNode> {
        self.get(id).ok_or(TreeError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut AlarmTreeNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::UnknownNode(id))
    }

    pub(crate) fn subtree(&self, id: NodeId) -> Result<&SubtreeNode> {
        let node = self.node(id)?;
        node.as_subtree()
            .ok_or_else(|| TreeError::NotASubtree(node.name.clone()))
    }

    pub(crate) fn subtree_mut(&mut self, id: NodeId) -> Result<&mut SubtreeNode> {
        let node = self.node_mut(id)?;
        let AlarmTreeNode { name, variant, .. } = node;
        match variant {
            NodeVariant::Subtree(subtree) => Ok(subtree),
            NodeVariant::ProcessVariable(_) => Err(TreeError::NotASubtree(name.clone())),
        }
    }

    fn leaf(&self, id: NodeId) -> Result<&ProcessVariableNode> {
        let node = self.node(id)?;
        node.as_process_variable()
            .ok_or_else(|| TreeError::NotAProcessVariable(node.name.clone()))
    }
}
