//! ALARMTREE - Hierarchical alarm aggregation for plant equipment trees
//!
//! The alarm tree mirrors how a plant organizes its equipment: facilities
//! contain components, components contain further components, and the
//! leaves are the individually alarming process variables. Every grouping
//! node keeps the worst active and the worst unacknowledged severity found
//! anywhere below it, and a leaf update travels upward only as far as it
//! changes something.
//!
//! # Feature Flags
//!
//! - **dispatch** (default): tokio based single-writer alarm event dispatcher
//!
//! # Examples
//!
//! ```rust
//! use alarmtree::{Config, Severity};
//!
//! let config = Config::from_yaml(r#"
//! facilities:
//!   - name: "Vacuum"
//!     kind: facility
//!     process_variables:
//!       - name: "VAC:gauge1"
//!       - name: "VAC:gauge2"
//! "#)?;
//! let mut tree = config.build_tree()?;
//!
//! let gauge = tree.find_by_path(&["Vacuum", "VAC:gauge2"]).unwrap();
//! tree.set_severities(gauge, Severity::Major, Severity::Major, None)?;
//! assert_eq!(tree.alarm_severity(tree.root()), Some(Severity::Major));
//! assert_eq!(tree.collect_unacknowledged_alarms(tree.root()), vec![gauge]);
//! # Ok::<(), alarmtree::TreeError>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// CORE MODULES (always available)
// ============================================================================

/// Error handling with structured error types
pub mod error;

/// Ordered alarm severity levels
pub mod severity;

/// Node types shared by leaves and subtrees
pub mod node;

/// Node arena and incremental severity propagation
pub mod tree;

/// Subtree and process variable builders
pub mod builder;

/// Read-only traversal of the tree
pub mod query;

/// YAML description of the tree structure
pub mod config;

/// Alarm events, the shared tree and the event dispatcher
pub mod dispatch;

// ============================================================================
// PUBLIC RE-EXPORTS
// ============================================================================

pub use builder::{ProcessVariableBuilder, SubtreeBuilder};
pub use config::{Config, DispatchConfig, NodeConfig, ProcessVariableConfig};
pub use dispatch::{AlarmEvent, AlarmUpdate, DispatchStats, SharedAlarmTree};
pub use error::{Result, TreeError};
pub use node::{
    AlarmTreeNode, ConfigurationKind, NodeId, NodeVariant, ProcessVariableNode, SubtreeNode,
    TreeNodeSource,
};
pub use query::TreeSummary;
pub use severity::Severity;
pub use tree::{AlarmTree, TreeStats};

#[cfg(feature = "dispatch")]
#[cfg_attr(docsrs, doc(cfg(feature = "dispatch")))]
pub use dispatch::{AlarmDispatcher, AlarmSender};

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub mod build_info {
    /// Git commit hash (if available)
    pub const GIT_HASH: Option<&str> = option_env!("GIT_HASH");

    /// Build timestamp
    pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

    /// Target triple
    pub const TARGET: &str = env!("TARGET");

    /// Build profile (debug/release)
    pub const PROFILE: &str = env!("PROFILE");

    /// Compiler that built the crate
    pub const RUSTC_VERSION: &str = env!("RUSTC_VERSION");
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG` and falls back to `alarmtree=info`. Calling it again,
/// or after another subscriber was installed, is harmless.
pub fn init() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alarmtree=info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if subscriber.try_init().is_err() {
        // Already initialized, ignore error
    }

    tracing::debug!("alarmtree {} logging initialized", VERSION);
}

/// One-line description of this build
pub fn build_summary() -> String {
    format!(
        "alarmtree {} ({} {}, built {}{})",
        VERSION,
        build_info::TARGET,
        build_info::PROFILE,
        build_info::BUILD_TIMESTAMP,
        build_info::GIT_HASH
            .map(|hash| format!(", git {}", hash))
            .unwrap_or_default(),
    )
}
