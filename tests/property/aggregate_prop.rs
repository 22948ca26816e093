use alarmtree::{
    AlarmTree, ConfigurationKind, NodeId, ProcessVariableBuilder, Severity, SubtreeBuilder,
    TreeNodeSource,
};
use proptest::prelude::*;

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

/// Three facilities with four process variables each, in a fixed layout
fn build_tree() -> (AlarmTree, Vec<NodeId>, Vec<NodeId>) {
    let mut tree = AlarmTree::new("root");
    let root = tree.root();
    let mut groups = Vec::new();
    let mut leaves = Vec::new();
    for g in 0..3 {
        let group = SubtreeBuilder::new(format!("group{}", g), ConfigurationKind::Facility, TreeNodeSource::Runtime)
            .parent(root)
            .build(&mut tree)
            .unwrap();
        let inner = SubtreeBuilder::new("inner", ConfigurationKind::Component, TreeNodeSource::Runtime)
            .parent(group)
            .build(&mut tree)
            .unwrap();
        for l in 0..4 {
            let parent = if l % 2 == 0 { group } else { inner };
            let leaf = ProcessVariableBuilder::new(format!("pv{}_{}", g, l), TreeNodeSource::Runtime)
                .parent(parent)
                .build(&mut tree)
                .unwrap();
            leaves.push(leaf);
        }
        groups.push(group);
    }
    (tree, groups, leaves)
}

fn expected(tree: &AlarmTree, node: NodeId) -> (Severity, Severity) {
    let leaves = tree.find_all_process_variable_nodes(node);
    let active = Severity::highest(leaves.iter().filter_map(|&l| tree.alarm_severity(l)));
    let unack = Severity::highest(leaves.iter().filter_map(|&l| tree.unacknowledged_alarm_severity(l)));
    (active, unack)
}

proptest! {
    #[test]
    fn test_aggregates_match_leaf_maximum(
        updates in prop::collection::vec((0usize..12, severity(), severity()), 1..200)
    ) {
        let (mut tree, groups, leaves) = build_tree();

        for (index, active, unack) in updates {
            tree.set_severities(leaves[index], active, unack, None).unwrap();

            for &node in groups.iter().chain(std::iter::once(&tree.root())) {
                let (active, unack) = expected(&tree, node);
                prop_assert_eq!(tree.alarm_severity(node), Some(active));
                prop_assert_eq!(tree.unacknowledged_alarm_severity(node), Some(unack));
            }
        }
    }

    #[test]
    fn test_aggregates_survive_removal(
        initial in prop::collection::vec((severity(), severity()), 12),
        removed in prop::collection::vec(0usize..12, 0..12)
    ) {
        let (mut tree, _groups, leaves) = build_tree();
        for (&leaf, &(active, unack)) in leaves.iter().zip(&initial) {
            tree.set_severities(leaf, active, unack, None).unwrap();
        }

        for index in removed {
            let leaf = leaves[index];
            let Some(node) = tree.get(leaf) else { continue };
            let (name, parent) = (node.name().to_string(), node.parent().unwrap());
            tree.remove_child(parent, &name).unwrap();
            prop_assert!(!tree.contains(leaf));
        }

        let root = tree.root();
        let (active, unack) = expected(&tree, root);
        prop_assert_eq!(tree.alarm_severity(root), Some(active));
        prop_assert_eq!(tree.unacknowledged_alarm_severity(root), Some(unack));
    }

    #[test]
    fn test_child_names_stay_unique(
        names in prop::collection::vec(("[a-c]{1,2}", any::<bool>()), 1..40)
    ) {
        let mut tree = AlarmTree::new("root");
        let root = tree.root();
        let mut accepted = std::collections::HashSet::new();

        for (name, as_subtree) in names {
            let result = if as_subtree {
                SubtreeBuilder::new(name.clone(), ConfigurationKind::Component, TreeNodeSource::Runtime)
                    .parent(root)
                    .build(&mut tree)
            } else {
                ProcessVariableBuilder::new(name.clone(), TreeNodeSource::Runtime)
                    .parent(root)
                    .build(&mut tree)
            };
            prop_assert_eq!(result.is_ok(), accepted.insert(name));
        }

        prop_assert_eq!(tree.children(root).len(), accepted.len());
        prop_assert_eq!(tree.len(), accepted.len() + 1);
    }
}
