// src/main.rs - Load an alarm tree and replay alarm events into it
//
// Usage: alarmtree <tree.yaml> [events.jsonl]
//
// Events are JSON objects, one per line, as accepted by `AlarmEvent`.
// Without an events file the tree is only built and summarized.

use alarmtree::{AlarmDispatcher, AlarmEvent, AlarmTree, Config, SharedAlarmTree};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    alarmtree::init();

    info!("{}", alarmtree::build_summary());

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        error!("Usage: alarmtree <tree.yaml> [events.jsonl]");
        std::process::exit(1);
    };
    let events_path = args.next();

    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load tree configuration from {}", config_path))?;
    let tree = config.build_tree().context("Failed to build alarm tree")?;
    info!("Built alarm tree with {} nodes", tree.len());

    let shared = SharedAlarmTree::new(tree);
    let (sender, dispatcher) = AlarmDispatcher::channel(shared.clone(), config.dispatch.channel_capacity);
    let dispatcher = tokio::spawn(dispatcher.run());

    if let Some(path) = events_path {
        let replay = async {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open events file {}", path))?;
            let mut lines = BufReader::new(file).lines();
            let mut line_no = 0usize;
            while let Some(line) = lines.next_line().await? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AlarmEvent>(&line) {
                    Ok(event) => sender.send(event).await?,
                    Err(e) => warn!("Skipping line {} of {}: {}", line_no, path, e),
                }
            }
            Ok::<usize, anyhow::Error>(line_no)
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
            res = replay => {
                let lines = res?;
                info!("Replayed {} lines from {}", lines, path);
            }
        }
    }
    drop(sender);

    let stats = dispatcher.await.context("Dispatcher task failed")?;
    info!(
        "Dispatch stats: {} events, {} applied, {} unmatched, {} failed",
        stats.events, stats.applied, stats.unmatched, stats.failed
    );

    report(&shared.read());
    Ok(())
}

fn report(tree: &AlarmTree) {
    let root = tree.root();
    if let Some(summary) = tree.summary(root) {
        info!(
            "{}: {} (unacknowledged {}), {} of {} process variables in alarm",
            summary.name,
            summary.alarm_severity,
            summary.unacknowledged_alarm_severity,
            summary.alarm_count,
            summary.process_variable_count
        );
    }

    for leaf in tree.collect_unacknowledged_alarms(root) {
        let path = tree.path(leaf).unwrap_or_default().join(" / ");
        let severity = tree.unacknowledged_alarm_severity(leaf).unwrap_or_default();
        info!("Unacknowledged {}: {}", severity, path);
    }

    let stats = tree.stats();
    info!(
        "Propagation: {} updates, {} steps, {} rescans",
        stats.severity_updates, stats.propagation_steps, stats.rescans
    );
}
