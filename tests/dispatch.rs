// tests/dispatch.rs
//! Alarm events flowing through the dispatcher into a shared tree

#![cfg(feature = "dispatch")]

use alarmtree::{AlarmDispatcher, AlarmEvent, AlarmUpdate, Config, Severity, SharedAlarmTree};
use chrono::Utc;

const TREE: &str = r#"
root_name: "Linac"
dispatch:
  channel_capacity: 4
facilities:
  - name: "RF"
    kind: facility
    process_variables:
      - name: "RF:fwd"
      - name: "RF:refl"
  - name: "Vacuum"
    kind: facility
    process_variables:
      - name: "VAC:gauge"
"#;

fn alarm(name: &str, severity: Severity, unacknowledged: Severity) -> AlarmEvent {
    AlarmEvent::Alarm(AlarmUpdate {
        name: name.to_string(),
        severity,
        unacknowledged,
        timestamp: Utc::now(),
        provenance: Some("integration".to_string()),
    })
}

#[tokio::test]
async fn test_dispatcher_applies_events_in_order() {
    let config = Config::from_yaml(TREE).unwrap();
    let shared = SharedAlarmTree::new(config.build_tree().unwrap());
    let (sender, dispatcher) = AlarmDispatcher::channel(shared.clone(), config.dispatch.channel_capacity);
    let task = tokio::spawn(dispatcher.run());

    // more events than the channel holds, so the sender has to wait
    sender.send(alarm("RF:fwd", Severity::Minor, Severity::Minor)).await.unwrap();
    sender.send(alarm("RF:refl", Severity::Major, Severity::Major)).await.unwrap();
    sender.send(alarm("VAC:gauge", Severity::NoAlarm, Severity::NoAlarm)).await.unwrap();
    sender.send(alarm("RF:refl", Severity::NoAlarm, Severity::Major)).await.unwrap();
    sender.send(alarm("BPM:x", Severity::Invalid, Severity::Invalid)).await.unwrap();
    sender
        .send(AlarmEvent::Acknowledge { name: "RF:refl".into(), user: Some("op".into()), timestamp: Utc::now() })
        .await
        .unwrap();
    drop(sender);

    let stats = task.await.unwrap();
    assert_eq!(stats.events, 6);
    assert_eq!(stats.applied, 5);
    assert_eq!(stats.unmatched, 1);
    assert_eq!(stats.failed, 0);

    let tree = shared.read();
    let rf = tree.find_by_path(&["RF"]).unwrap();
    assert_eq!(tree.alarm_severity(rf), Some(Severity::Minor));
    assert_eq!(tree.unacknowledged_alarm_severity(rf), Some(Severity::Minor));
    assert_eq!(tree.alarm_severity(tree.root()), Some(Severity::Minor));

    let pending = tree.collect_unacknowledged_alarms(tree.root());
    assert_eq!(pending, vec![tree.find_by_path(&["RF", "RF:fwd"]).unwrap()]);
}

#[tokio::test]
async fn test_readers_see_consistent_tree_while_dispatching() {
    let config = Config::from_yaml(TREE).unwrap();
    let shared = SharedAlarmTree::new(config.build_tree().unwrap());
    let (sender, dispatcher) = AlarmDispatcher::channel(shared.clone(), 64);
    let task = tokio::spawn(dispatcher.run());

    let reader = {
        let shared = shared.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                {
                    let tree = shared.read();
                    let root = tree.root();
                    let leaves = tree.find_all_process_variable_nodes(root);
                    let highest = Severity::highest(leaves.iter().filter_map(|&l| tree.alarm_severity(l)));
                    assert_eq!(tree.alarm_severity(root), Some(highest));
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for i in 0..50 {
        let severity = Severity::ALL[i % Severity::ALL.len()];
        sender.send(alarm("VAC:gauge", severity, severity)).await.unwrap();
    }
    drop(sender);

    reader.await.unwrap();
    let stats = task.await.unwrap();
    assert_eq!(stats.applied, 50);
}

#[tokio::test]
async fn test_send_after_dispatcher_stopped_fails() {
    let shared = SharedAlarmTree::new(Config::default().build_tree().unwrap());
    let (sender, dispatcher) = AlarmDispatcher::channel(shared, 1);
    drop(dispatcher);

    let err = sender.send(alarm("x", Severity::Minor, Severity::Minor)).await.unwrap_err();
    assert!(matches!(err, alarmtree::TreeError::ChannelClosed));
    assert!(sender.try_send(alarm("x", Severity::Minor, Severity::Minor)).is_err());
}
