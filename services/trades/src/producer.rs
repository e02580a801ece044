//! Publishes generated trades at a fixed rate

use crate::generator::TradeGenerator;
use anyhow::{Context, Result};
use chrono::Utc;
use event_log::{EventLog, Record, RecordPosition};
use service_config::TradesConfig;
use std::sync::Arc;
use std::time::Duration;
use stream_service_shared::StageMetrics;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use types::Trade;

const STAGE: &str = "trades";

/// Append one trade to `topic`, keyed by its pair
pub async fn publish_trade(
    log: &dyn EventLog,
    topic: &str,
    trade: &Trade,
) -> Result<RecordPosition> {
    let value = trade.to_json().context("encoding trade")?;
    let position = log
        .append(topic, Record::new(trade.pair.clone(), value, trade.timestamp_ms))
        .await
        .with_context(|| format!("publishing to {}", topic))?;
    Ok(position)
}

/// Produce trades until shutdown; returns how many were published
pub async fn run(
    log: Arc<dyn EventLog>,
    config: &TradesConfig,
    shutdown_tx: &watch::Sender<bool>,
) -> Result<u64> {
    let mut generator = TradeGenerator::from_config(config)?;
    let pairs: Vec<&str> = generator.pairs().collect();
    info!(
        "Producing {} trades/s for {:?} into '{}'",
        config.trades_per_second, pairs, config.output_topic
    );

    let period = Duration::from_secs_f64(1.0 / f64::from(config.trades_per_second.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = shutdown_tx.subscribe();
    let metrics = StageMetrics::new();

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                let trade = generator.next_trade(Utc::now().timestamp_millis());
                let position = publish_trade(log.as_ref(), &config.output_topic, &trade).await?;
                metrics.add_emitted(1);
                debug!(
                    "{} {} @ {} -> partition {} offset {}",
                    trade.pair, trade.volume, trade.price, position.partition, position.offset
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    metrics.log_summary(STAGE);
    Ok(metrics.snapshot().records_emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::{partition_for, MemoryLog};

    #[tokio::test]
    async fn test_publish_keys_by_pair() {
        let log = MemoryLog::new(4);
        let trade = Trade::new("SOL/USD", 20.0, 1.0, 5);
        let position = publish_trade(&log, "trades", &trade).await.unwrap();
        assert_eq!(position.partition, partition_for("SOL/USD", 4));

        let stored = &log.snapshot_topic("trades")[position.partition as usize][0];
        assert_eq!(stored.key, "SOL/USD");
        assert_eq!(Trade::from_json(&stored.value).unwrap(), trade);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let log = Arc::new(MemoryLog::new(2));
        let config = TradesConfig {
            trades_per_second: 1_000,
            seed: Some(11),
            ..TradesConfig::default()
        };
        let (tx, _rx) = watch::channel(false);
        let stop = async {
            for _ in 0..400 {
                if log.topic_len("trades") >= 10 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send_replace(true);
        };

        let (published, ()) = tokio::join!(run(log.clone(), &config, &tx), stop);
        let published = published.unwrap();
        assert!(published >= 10);
        assert_eq!(published as usize, log.topic_len("trades"));

        for partition in log.snapshot_topic("trades") {
            for record in partition {
                let trade = Trade::from_json(&record.value).unwrap();
                assert_eq!(record.key, trade.pair);
            }
        }
    }
}
