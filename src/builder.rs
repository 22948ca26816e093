// src/builder.rs - Node construction with optional atomic attach
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::node::{ConfigurationKind, NodeId, TreeNodeSource};
use crate::severity::Severity;
use crate::tree::AlarmTree;

/// Builder for subtree nodes
///
/// The configuration kind is normalized once, when the builder is created:
/// subcomponents and I/O controllers become plain components. If a parent is
/// given, [`build`](Self::build) attaches the new node in the same call; when
/// the attach is rejected the node is dropped again and the error returned,
/// so callers never see a half-attached node.
///
/// # Examples
///
/// ```rust
/// use alarmtree::{AlarmTree, ConfigurationKind, SubtreeBuilder, TreeNodeSource};
///
/// let mut tree = AlarmTree::new("root");
/// let ioc = SubtreeBuilder::new("ioc-01", ConfigurationKind::Ioc, TreeNodeSource::Directory)
///     .parent(tree.root())
///     .build(&mut tree)?;
///
/// assert_eq!(tree.get(ioc).unwrap().kind(), ConfigurationKind::Component);
/// # Ok::<(), alarmtree::TreeError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct SubtreeBuilder {
    name: String,
    kind: ConfigurationKind,
    source: TreeNodeSource,
    parent: Option<NodeId>,
}

impl SubtreeBuilder {
    /// Start building a subtree node
    pub fn new(name: impl Into<String>, kind: ConfigurationKind, source: TreeNodeSource) -> Self {
        Self {
            name: name.into(),
            kind: kind.normalized(),
            source,
            parent: None,
        }
    }

    /// Attach the node below `parent` as part of [`build`](Self::build)
    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Like [`parent`](Self::parent) but accepting an optional handle
    pub fn maybe_parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent = parent;
        self
    }

    /// Kind after normalization
    pub fn kind(&self) -> ConfigurationKind {
        self.kind
    }

    /// Create the node in `tree`, attaching it if a parent was set
    pub fn build(self, tree: &mut AlarmTree) -> Result<NodeId> {
        let id = tree.create_subtree(self.name, self.kind, self.source);
        if let Some(parent) = self.parent {
            if let Err(e) = tree.add_child(parent, id) {
                tree.discard_detached(id);
                return Err(e);
            }
        }
        debug!("Built subtree node {}", id);
        Ok(id)
    }
}

/// Builder for process variable nodes
///
/// Same attach semantics as [`SubtreeBuilder`]. Initial severities are set
/// before the node is attached, so the parent folds them in directly.
#[derive(Debug, Clone)]
#[must_use]
pub struct ProcessVariableBuilder {
    name: String,
    source: TreeNodeSource,
    parent: Option<NodeId>,
    description: Option<String>,
    active: Severity,
    unacknowledged: Severity,
    timestamp: Option<DateTime<Utc>>,
}

impl ProcessVariableBuilder {
    /// Start building a process variable node
    pub fn new(name: impl Into<String>, source: TreeNodeSource) -> Self {
        Self {
            name: name.into(),
            source,
            parent: None,
            description: None,
            active: Severity::lowest(),
            unacknowledged: Severity::lowest(),
            timestamp: None,
        }
    }

    /// Attach the node below `parent` as part of [`build`](Self::build)
    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Free-text description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Initial active and unacknowledged severity
    pub fn severities(mut self, active: Severity, unacknowledged: Severity) -> Self {
        self.active = active;
        self.unacknowledged = unacknowledged;
        self
    }

    /// Timestamp of the initial severities
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Create the node in `tree`, attaching it if a parent was set
    pub fn build(self, tree: &mut AlarmTree) -> Result<NodeId> {
        let id = tree.create_process_variable(self.name, self.source);
        tree.set_severities(id, self.active, self.unacknowledged, self.timestamp)?;
        if let Some(pv) = tree.node_mut(id)?.as_process_variable_mut() {
            pv.description = self.description;
        }
        if let Some(parent) = self.parent {
            if let Err(e) = tree.add_child(parent, id) {
                tree.discard_detached(id);
                return Err(e);
            }
        }
        Ok(id)
    }
}
