// src/node.rs - Alarm tree node types shared by leaves and subtrees
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::severity::Severity;

// ============================================================================
// NODE HANDLES
// ============================================================================

/// Stable handle to a node stored in an [`AlarmTree`](crate::AlarmTree)
///
/// Handles carry a generation counter. Once a node is removed its slot may be
/// reused, but the old handle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Structural classification of a node in the equipment hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationKind {
    /// The single tree root
    Root,
    /// Plant facility or area
    Facility,
    /// Equipment component
    Component,
    /// Part of a component
    Subcomponent,
    /// I/O controller
    Ioc,
    /// Process variable record (leaf)
    Record,
}

impl ConfigurationKind {
    /// Collapse the kinds the tree does not distinguish between.
    ///
    /// Subcomponents and I/O controllers are both treated as plain components.
    pub const fn normalized(self) -> Self {
        match self {
            ConfigurationKind::Subcomponent | ConfigurationKind::Ioc => ConfigurationKind::Component,
            other => other,
        }
    }
}

/// Which external system populated a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNodeSource {
    /// Created together with the tree
    Root,
    /// Imported from a directory service
    Directory,
    /// Loaded from a tree configuration file
    ConfigFile,
    /// Added at runtime, e.g. for a process variable seen in an alarm event
    Runtime,
}

// ============================================================================
// LEAF
// ============================================================================

/// Alarm state of a single monitored process variable
///
/// Active and unacknowledged severity are independent: acknowledging an
/// alarm clears the unacknowledged value while the active condition may
/// persist, and a condition that cleared stays unacknowledged until an
/// operator confirms it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessVariableNode {
    pub(crate) active: Severity,
    pub(crate) unacknowledged: Severity,
    pub(crate) last_update: Option<DateTime<Utc>>,
    pub(crate) description: Option<String>,
}

impl ProcessVariableNode {
    pub(crate) fn new() -> Self {
        Self {
            active: Severity::lowest(),
            unacknowledged: Severity::lowest(),
            last_update: None,
            description: None,
        }
    }

    /// Currently active severity
    pub fn alarm_severity(&self) -> Severity {
        self.active
    }

    /// Highest severity not yet acknowledged
    pub fn unacknowledged_alarm_severity(&self) -> Severity {
        self.unacknowledged
    }

    /// Timestamp of the last alarm event applied to this variable
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Free-text description from the tree configuration
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

// ============================================================================
// SUBTREE
// ============================================================================

/// Organizational node aggregating the alarm state of everything below it
///
/// Children live in two disjoint, insertion-ordered namespaces. The cached
/// severities always equal the highest value over the direct children,
/// which in turn makes them the highest over all descendants.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtreeNode {
    pub(crate) subtrees: IndexMap<String, NodeId>,
    pub(crate) process_variables: IndexMap<String, NodeId>,
    pub(crate) highest_active: Severity,
    pub(crate) highest_unacknowledged: Severity,
}

impl SubtreeNode {
    pub(crate) fn new() -> Self {
        Self {
            subtrees: IndexMap::new(),
            process_variables: IndexMap::new(),
            highest_active: Severity::lowest(),
            highest_unacknowledged: Severity::lowest(),
        }
    }

    /// Highest active severity below this node
    pub fn alarm_severity(&self) -> Severity {
        self.highest_active
    }

    /// Highest unacknowledged severity below this node
    pub fn unacknowledged_alarm_severity(&self) -> Severity {
        self.highest_unacknowledged
    }

    /// True if a child of either namespace uses `name`
    pub fn contains(&self, name: &str) -> bool {
        self.process_variables.contains_key(name) || self.subtrees.contains_key(name)
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.process_variables
            .get(name)
            .or_else(|| self.subtrees.get(name))
            .copied()
    }

    /// Subtree children in insertion order, followed by leaf children in
    /// insertion order
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.subtrees
            .values()
            .chain(self.process_variables.values())
            .copied()
    }

    /// Subtree children only
    pub fn subtree_children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.subtrees.values().copied()
    }

    /// Leaf children only
    pub fn process_variable_children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.process_variables.values().copied()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.subtrees.len() + self.process_variables.len()
    }

    /// True if this node has no children
    pub fn is_empty(&self) -> bool {
        self.subtrees.is_empty() && self.process_variables.is_empty()
    }

    /// Drops `name` from whichever namespace holds it
    pub(crate) fn detach(&mut self, name: &str) -> Option<NodeId> {
        self.process_variables
            .shift_remove(name)
            .or_else(|| self.subtrees.shift_remove(name))
    }

    pub(crate) fn reset_severities(&mut self) {
        self.highest_active = Severity::lowest();
        self.highest_unacknowledged = Severity::lowest();
    }
}

// ============================================================================
// COMMON NODE
// ============================================================================

/// The two kinds of node the tree knows about
#[derive(Debug, Clone, PartialEq)]
pub enum NodeVariant {
    /// Leaf
    ProcessVariable(ProcessVariableNode),
    /// Organizational grouping
    Subtree(SubtreeNode),
}

/// A node of the alarm tree
///
/// Carries the capabilities shared by leaves and subtrees. Severities of a
/// subtree are derived from its children and cannot be written directly.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmTreeNode {
    pub(crate) name: String,
    pub(crate) kind: ConfigurationKind,
    pub(crate) source: TreeNodeSource,
    pub(crate) parent: Option<NodeId>,
    pub(crate) variant: NodeVariant,
}

impl AlarmTreeNode {
    pub(crate) fn process_variable(name: String, source: TreeNodeSource) -> Self {
        Self {
            name,
            kind: ConfigurationKind::Record,
            source,
            parent: None,
            variant: NodeVariant::ProcessVariable(ProcessVariableNode::new()),
        }
    }

    pub(crate) fn subtree(name: String, kind: ConfigurationKind, source: TreeNodeSource) -> Self {
        Self {
            name,
            kind,
            source,
            parent: None,
            variant: NodeVariant::Subtree(SubtreeNode::new()),
        }
    }

    /// Name, unique among siblings
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration kind
    pub fn kind(&self) -> ConfigurationKind {
        self.kind
    }

    /// Provenance tag
    pub fn source(&self) -> TreeNodeSource {
        self.source
    }

    /// Parent handle, `None` for the root and for detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Variant payload
    pub fn variant(&self) -> &NodeVariant {
        &self.variant
    }

    /// Active severity (own for leaves, aggregated for subtrees)
    pub fn alarm_severity(&self) -> Severity {
        match &self.variant {
            NodeVariant::ProcessVariable(pv) => pv.alarm_severity(),
            NodeVariant::Subtree(subtree) => subtree.alarm_severity(),
        }
    }

    /// Unacknowledged severity (own for leaves, aggregated for subtrees)
    pub fn unacknowledged_alarm_severity(&self) -> Severity {
        match &self.variant {
            NodeVariant::ProcessVariable(pv) => pv.unacknowledged_alarm_severity(),
            NodeVariant::Subtree(subtree) => subtree.unacknowledged_alarm_severity(),
        }
    }

    /// True if either severity channel is in alarm
    pub fn has_alarm(&self) -> bool {
        self.alarm_severity().is_alarm() || self.unacknowledged_alarm_severity().is_alarm()
    }

    /// True for leaf nodes
    pub fn is_process_variable(&self) -> bool {
        matches!(self.variant, NodeVariant::ProcessVariable(_))
    }

    /// Leaf payload, if this is a leaf
    pub fn as_process_variable(&self) -> Option<&ProcessVariableNode> {
        match &self.variant {
            NodeVariant::ProcessVariable(pv) => Some(pv),
            NodeVariant::Subtree(_) => None,
        }
    }

    /// Subtree payload, if this is a subtree
    pub fn as_subtree(&self) -> Option<&SubtreeNode> {
        match &self.variant {
            NodeVariant::Subtree(subtree) => Some(subtree),
            NodeVariant::ProcessVariable(_) => None,
        }
    }

    pub(crate) fn as_process_variable_mut(&mut self) -> Option<&mut ProcessVariableNode> {
        match &mut self.variant {
            NodeVariant::ProcessVariable(pv) => Some(pv),
            NodeVariant::Subtree(_) => None,
        }
    }
}
