// src/dispatch.rs - Alarm events and the single-writer dispatch path
//
// Alarm sources hand events to an AlarmSender. One AlarmDispatcher task owns
// the receiving end and is the only writer of the shared tree; readers take
// the read side of the same lock and never overlap with a write.

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::Result;
use crate::severity::Severity;
use crate::tree::AlarmTree;

#[cfg(feature = "dispatch")]
use crate::error::TreeError;
#[cfg(feature = "dispatch")]
use tokio::sync::mpsc;
#[cfg(feature = "dispatch")]
use tracing::{error, info};

// ============================================================================
// EVENTS
// ============================================================================

/// New alarm state of one process variable as reported by an alarm source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmUpdate {
    /// Process variable name; every leaf with this name is updated
    pub name: String,

    /// New active severity
    pub severity: Severity,

    /// New unacknowledged severity
    pub unacknowledged: Severity,

    /// Time the source observed the change
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// System that produced the event; carried along, never interpreted
    #[serde(default)]
    pub provenance: Option<String>,
}

/// Events consumed by the alarm tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlarmEvent {
    /// Severity change
    Alarm(AlarmUpdate),

    /// Operator acknowledged the alarm of a process variable
    Acknowledge {
        /// Process variable name
        name: String,
        /// Operator, if the source reports one
        #[serde(default)]
        user: Option<String>,
        /// Time of the acknowledgement
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl AlarmEvent {
    /// Process variable the event refers to
    pub fn name(&self) -> &str {
        match self {
            AlarmEvent::Alarm(update) => &update.name,
            AlarmEvent::Acknowledge { name, .. } => name,
        }
    }
}

impl AlarmTree {
    /// Apply one event to every process variable carrying its name
    ///
    /// Returns how many leaves were touched; zero means the name is not part
    /// of the tree.
    pub fn apply_event(&mut self, event: &AlarmEvent) -> Result<usize> {
        let leaves = self.find_process_variable_nodes(self.root(), event.name());
        if leaves.is_empty() {
            warn!("No process variable '{}' in alarm tree", event.name());
            return Ok(0);
        }

        for &leaf in &leaves {
            match event {
                AlarmEvent::Alarm(update) => {
                    self.set_severities(leaf, update.severity, update.unacknowledged, Some(update.timestamp))?;
                }
                AlarmEvent::Acknowledge { .. } => {
                    self.acknowledge(leaf)?;
                }
            }
        }
        trace!("Applied {:?} to {} node(s)", event, leaves.len());
        Ok(leaves.len())
    }
}

// ============================================================================
// SHARED TREE
// ============================================================================

/// Alarm tree shared between one writer and any number of readers
///
/// Queries hold a read guard and may run concurrently; a write guard
/// excludes every reader for the duration of a mutation.
#[derive(Debug, Clone)]
pub struct SharedAlarmTree {
    inner: Arc<RwLock<AlarmTree>>,
}

impl SharedAlarmTree {
    /// Take ownership of `tree`
    pub fn new(tree: AlarmTree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    /// Shared access for queries
    pub fn read(&self) -> RwLockReadGuard<'_, AlarmTree> {
        self.inner.read()
    }

    /// Exclusive access for mutation
    pub fn write(&self) -> RwLockWriteGuard<'_, AlarmTree> {
        self.inner.write()
    }

    /// Apply one event under the write lock
    pub fn apply(&self, event: &AlarmEvent) -> Result<usize> {
        self.inner.write().apply_event(event)
    }
}

impl From<AlarmTree> for SharedAlarmTree {
    fn from(tree: AlarmTree) -> Self {
        Self::new(tree)
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Totals reported by [`AlarmDispatcher::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Events received
    pub events: u64,
    /// Events that reached at least one leaf
    pub applied: u64,
    /// Events naming no known process variable
    pub unmatched: u64,
    /// Events rejected by the tree
    pub failed: u64,
}

/// Sending half handed to alarm sources
#[cfg(feature = "dispatch")]
#[derive(Debug, Clone)]
pub struct AlarmSender {
    tx: mpsc::Sender<AlarmEvent>,
}

#[cfg(feature = "dispatch")]
impl AlarmSender {
    /// Queue an event, waiting while the channel is full
    pub async fn send(&self, event: AlarmEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| TreeError::ChannelClosed)
    }

    /// Queue an event without waiting; fails if the channel is full or closed
    pub fn try_send(&self, event: AlarmEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|_| TreeError::ChannelClosed)
    }
}

/// The single writer of a [`SharedAlarmTree`]
///
/// # Examples
///
/// ```rust
/// use alarmtree::{AlarmDispatcher, AlarmEvent, AlarmTree, AlarmUpdate, Severity, SharedAlarmTree};
/// use alarmtree::{ProcessVariableBuilder, TreeNodeSource};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut tree = AlarmTree::new("root");
/// let root = tree.root();
/// ProcessVariableBuilder::new("pv", TreeNodeSource::Runtime).parent(root).build(&mut tree)?;
///
/// let shared = SharedAlarmTree::new(tree);
/// let (sender, dispatcher) = AlarmDispatcher::channel(shared.clone(), 16);
/// let task = tokio::spawn(dispatcher.run());
///
/// sender.send(AlarmEvent::Alarm(AlarmUpdate {
///     name: "pv".into(),
///     severity: Severity::Minor,
///     unacknowledged: Severity::Minor,
///     timestamp: chrono::Utc::now(),
///     provenance: None,
/// })).await?;
/// drop(sender);
///
/// let stats = task.await.unwrap();
/// assert_eq!(stats.applied, 1);
/// assert_eq!(shared.read().alarm_severity(root), Some(Severity::Minor));
/// # Ok::<(), alarmtree::TreeError>(())
/// # }).unwrap();
/// ```
#[cfg(feature = "dispatch")]
#[derive(Debug)]
pub struct AlarmDispatcher {
    tree: SharedAlarmTree,
    rx: mpsc::Receiver<AlarmEvent>,
    stats: DispatchStats,
}

#[cfg(feature = "dispatch")]
impl AlarmDispatcher {
    /// Create a bounded channel feeding a dispatcher for `tree`
    pub fn channel(tree: SharedAlarmTree, capacity: usize) -> (AlarmSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let dispatcher = Self {
            tree,
            rx,
            stats: DispatchStats::default(),
        };
        (AlarmSender { tx }, dispatcher)
    }

    /// Drain events until every sender is dropped
    pub async fn run(mut self) -> DispatchStats {
        info!("Alarm dispatcher started");
        while let Some(event) = self.rx.recv().await {
            self.dispatch(&event);
        }
        info!(
            "Alarm dispatcher stopped after {} events ({} unmatched, {} failed)",
            self.stats.events, self.stats.unmatched, self.stats.failed
        );
        self.stats
    }

    fn dispatch(&mut self, event: &AlarmEvent) {
        self.stats.events += 1;
        match self.tree.apply(event) {
            Ok(0) => self.stats.unmatched += 1,
            Ok(_) => self.stats.applied += 1,
            Err(e) => {
                error!("Failed to apply alarm event for '{}': {}", event.name(), e);
                self.stats.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ProcessVariableBuilder, SubtreeBuilder};
    use crate::node::{ConfigurationKind, TreeNodeSource};

    fn update(name: &str, active: Severity, unack: Severity) -> AlarmEvent {
        AlarmEvent::Alarm(AlarmUpdate {
            name: name.to_string(),
            severity: active,
            unacknowledged: unack,
            timestamp: Utc::now(),
            provenance: Some("test".to_string()),
        })
    }

    #[test]
    fn test_event_updates_every_leaf_with_name() {
        let mut tree = AlarmTree::new("root");
        let root = tree.root();
        let a = SubtreeBuilder::new("A", ConfigurationKind::Facility, TreeNodeSource::Runtime)
            .parent(root)
            .build(&mut tree)
            .unwrap();
        ProcessVariableBuilder::new("pv", TreeNodeSource::Runtime).parent(root).build(&mut tree).unwrap();
        ProcessVariableBuilder::new("pv", TreeNodeSource::Runtime).parent(a).build(&mut tree).unwrap();

        let touched = tree.apply_event(&update("pv", Severity::Major, Severity::Major)).unwrap();
        assert_eq!(touched, 2);
        assert_eq!(tree.alarm_severity(a), Some(Severity::Major));

        let leaf = tree.get_child(a, "pv").unwrap();
        assert!(tree.get(leaf).unwrap().as_process_variable().unwrap().last_update().is_some());
    }

    #[test]
    fn test_unknown_name_touches_nothing() {
        let mut tree = AlarmTree::new("root");
        assert_eq!(tree.apply_event(&update("ghost", Severity::Major, Severity::Major)).unwrap(), 0);
        assert_eq!(tree.alarm_severity(tree.root()), Some(Severity::Unknown));
    }

    #[test]
    fn test_acknowledge_event() {
        let mut tree = AlarmTree::new("root");
        let root = tree.root();
        ProcessVariableBuilder::new("pv", TreeNodeSource::Runtime)
            .severities(Severity::Minor, Severity::Minor)
            .parent(root)
            .build(&mut tree)
            .unwrap();

        let ack = AlarmEvent::Acknowledge { name: "pv".into(), user: None, timestamp: Utc::now() };
        tree.apply_event(&ack).unwrap();
        assert_eq!(tree.alarm_severity(root), Some(Severity::Minor));
        assert_eq!(tree.unacknowledged_alarm_severity(root), Some(Severity::NoAlarm));
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"type":"alarm","name":"pv","severity":"MAJOR","unacknowledged":"MINOR"}"#;
        let event: AlarmEvent = serde_json::from_str(json).unwrap();
        match event {
            AlarmEvent::Alarm(update) => {
                assert_eq!(update.severity, Severity::Major);
                assert_eq!(update.unacknowledged, Severity::Minor);
                assert!(update.provenance.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }

        let ack: AlarmEvent = serde_json::from_str(r#"{"type":"acknowledge","name":"pv","user":"op"}"#).unwrap();
        assert_eq!(ack.name(), "pv");
    }
}
