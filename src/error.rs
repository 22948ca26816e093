use crate::node::NodeId;
use thiserror::Error;

/// Application level error type used throughout the crate.
///
/// Structural violations of the tree contract are reported through this type
/// as plain values. Looking up something that does not exist is never an
/// error; lookups return `Option` and removals of absent children are no-ops.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A sibling with the same name already exists in one of the two namespaces
    #[error("Duplicate child name '{name}' below '{parent}'")]
    DuplicateName {
        /// Name of the parent subtree
        parent: String,
        /// Name that is already taken
        name: String,
    },

    /// The node is neither a process variable nor a subtree
    #[error("Unrecognized node variant for '{0}'")]
    UnrecognizedNodeVariant(String),

    /// Handle does not resolve to a live node (never created, or removed)
    #[error("Unknown node handle {0}")]
    UnknownNode(NodeId),

    /// Operation needs a subtree node but got a leaf
    #[error("Node '{0}' is not a subtree node")]
    NotASubtree(String),

    /// Operation needs a process variable node but got a subtree
    #[error("Node '{0}' is not a process variable node")]
    NotAProcessVariable(String),

    /// Child already has a parent; detach or move it instead
    #[error("Node '{0}' is already attached to a parent")]
    AlreadyAttached(String),

    /// Attaching would make a node its own ancestor
    #[error("Attaching '{child}' below '{parent}' would create a cycle")]
    WouldCreateCycle {
        /// Name of the intended parent
        parent: String,
        /// Name of the node being attached
        child: String,
    },

    /// Node is not a direct child of the given subtree
    #[error("Node '{child}' is not a direct child of '{parent}'")]
    NotAChild {
        /// Name of the given subtree
        parent: String,
        /// Name of the node
        child: String,
    },

    /// The root cannot be attached, moved or removed
    #[error("The root node cannot be attached, moved or removed")]
    RootNode,

    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error while decoding JSON alarm events
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The dispatcher is gone and can no longer accept events
    #[error("Alarm event channel closed")]
    ChannelClosed,
}

/// Convenient alias over [`Result`] using [`TreeError`]
pub type Result<T> = std::result::Result<T, TreeError>;
