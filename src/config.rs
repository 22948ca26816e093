// src/config.rs - Alarm tree structure configuration
//
// Describes the equipment hierarchy in YAML and turns it into an AlarmTree.
// Only structure is configured here; severities always come from alarm events.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::builder::{ProcessVariableBuilder, SubtreeBuilder};
use crate::error::{Result, TreeError};
use crate::node::{ConfigurationKind, NodeId, TreeNodeSource};
use crate::tree::AlarmTree;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main alarm tree configuration
///
/// # Examples
///
/// ```rust
/// use alarmtree::{Config, Severity};
///
/// let config = Config::from_yaml(r#"
/// root_name: "Linac"
/// facilities:
///   - name: "RF"
///     kind: facility
///     children:
///       - name: "Klystron 1"
///         kind: ioc
///         process_variables:
///           - name: "KLY1:power"
/// "#)?;
///
/// let tree = config.build_tree()?;
/// assert_eq!(tree.find_all_process_variable_nodes(tree.root()).len(), 1);
/// # Ok::<(), alarmtree::TreeError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the root node
    #[serde(default = "default_root_name")]
    pub root_name: String,

    /// Alarm event dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Top level groupings below the root
    #[serde(default)]
    pub facilities: Vec<NodeConfig>,

    /// Process variables directly below the root
    #[serde(default)]
    pub process_variables: Vec<ProcessVariableConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_name: default_root_name(),
            dispatch: DispatchConfig::default(),
            facilities: Vec::new(),
            process_variables: Vec::new(),
        }
    }
}

// ============================================================================
// TREE STRUCTURE
// ============================================================================

/// One organizational node and its children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name, unique among its siblings
    pub name: String,

    /// Configuration kind; subcomponents and IOCs are built as components
    #[serde(default = "default_kind")]
    pub kind: ConfigurationKind,

    /// Where this entry originally came from
    #[serde(default = "default_source")]
    pub source: TreeNodeSource,

    /// Nested groupings
    #[serde(default)]
    pub children: Vec<NodeConfig>,

    /// Leaves of this node
    #[serde(default)]
    pub process_variables: Vec<ProcessVariableConfig>,
}

/// A monitored process variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVariableConfig {
    /// Channel name, as used in alarm events
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// DISPATCH CONFIGURATION
// ============================================================================

/// Alarm event dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of the bounded event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ============================================================================
// LOADING AND VALIDATION
// ============================================================================

impl Config {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        info!("Loaded tree configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check names, kinds and settings before anything is built
    pub fn validate(&self) -> Result<()> {
        if self.root_name.trim().is_empty() {
            return Err(TreeError::Config("root_name must not be empty".to_string()));
        }
        if self.dispatch.channel_capacity == 0 {
            return Err(TreeError::Config(
                "dispatch.channel_capacity must be greater than zero".to_string(),
            ));
        }
        validate_level(&self.root_name, &self.facilities, &self.process_variables)
    }

    /// Build a fresh tree from this configuration
    pub fn build_tree(&self) -> Result<AlarmTree> {
        let mut tree = AlarmTree::new(self.root_name.clone());
        let root = tree.root();
        self.populate(&mut tree, root)?;
        Ok(tree)
    }

    /// Build the configured nodes below `parent` of an existing tree
    ///
    /// Combine with [`AlarmTree::clear_children`] to reload a subtree.
    pub fn populate(&self, tree: &mut AlarmTree, parent: NodeId) -> Result<()> {
        for facility in &self.facilities {
            build_node(tree, parent, facility)?;
        }
        build_process_variables(tree, parent, &self.process_variables)?;
        debug!("Populated tree with {} nodes", tree.len());
        Ok(())
    }
}

fn validate_level(
    parent: &str,
    children: &[NodeConfig],
    process_variables: &[ProcessVariableConfig],
) -> Result<()> {
    let mut seen = HashSet::new();
    let names = children
        .iter()
        .map(|c| c.name.as_str())
        .chain(process_variables.iter().map(|pv| pv.name.as_str()));
    for name in names {
        if name.trim().is_empty() {
            return Err(TreeError::Config(format!("Empty node name below '{}'", parent)));
        }
        if !seen.insert(name) {
            return Err(TreeError::DuplicateName {
                parent: parent.to_string(),
                name: name.to_string(),
            });
        }
    }

    for child in children {
        if matches!(child.kind, ConfigurationKind::Root | ConfigurationKind::Record) {
            return Err(TreeError::Config(format!(
                "Node '{}' cannot have kind {:?}",
                child.name, child.kind
            )));
        }
        validate_level(&child.name, &child.children, &child.process_variables)?;
    }
    Ok(())
}

fn build_node(tree: &mut AlarmTree, parent: NodeId, config: &NodeConfig) -> Result<NodeId> {
    let id = SubtreeBuilder::new(config.name.clone(), config.kind, config.source)
        .parent(parent)
        .build(tree)?;
    for child in &config.children {
        build_node(tree, id, child)?;
    }
    build_process_variables(tree, id, &config.process_variables)?;
    Ok(id)
}

fn build_process_variables(
    tree: &mut AlarmTree,
    parent: NodeId,
    process_variables: &[ProcessVariableConfig],
) -> Result<()> {
    for pv in process_variables {
        let mut builder = ProcessVariableBuilder::new(pv.name.clone(), TreeNodeSource::ConfigFile);
        if let Some(description) = &pv.description {
            builder = builder.description(description.clone());
        }
        builder.parent(parent).build(tree)?;
    }
    Ok(())
}

// ============================================================================
// DEFAULT VALUES
// ============================================================================

fn default_root_name() -> String { "Alarm Tree".to_string() }
fn default_kind() -> ConfigurationKind { ConfigurationKind::Component }
fn default_source() -> TreeNodeSource { TreeNodeSource::ConfigFile }
fn default_channel_capacity() -> usize { 1000 }
