//! Trades in, feature rows out: every stage running together

use event_log::{EventLog, Record};
use message_sink::test_utils::CollectorSink;
use pipeline_e2e_tests::{
    closes_by_minute, minute_trades, number, rows_by_minute, PipelineHarness, MINUTE_MS,
};
use service_config::EmitMode;
use std::sync::Arc;
use std::time::Duration;
use types::{Candle, Trade};

const TIMEOUT: Duration = Duration::from_secs(20);

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[tokio::test]
async fn test_trades_become_enriched_feature_rows() {
    let harness = PipelineHarness::new(2).unwrap();
    let btc = minute_trades("BTC/USD", 0..41, 5, 100.0);
    let eth = minute_trades("ETH/USD", 0..41, 5, 2_000.0);

    harness.publish(&btc).await.unwrap();
    harness
        .log
        .append("trades", Record::new("ETH/USD", b"{not json".to_vec(), 0))
        .await
        .unwrap();
    harness.publish(&eth).await.unwrap();
    // Far behind the open window: rejected, must not touch minute 3
    harness
        .publish(&[Trade::new("ETH/USD", 1.0, 1.0, 3 * MINUTE_MS + 500)])
        .await
        .unwrap();

    let sink = Arc::new(CollectorSink::new());
    harness.run_until(sink.clone(), 80, TIMEOUT).await.unwrap();
    let received = sink.received_messages();

    // Minute 40 is still open in final mode
    let rows = rows_by_minute(&received, "BTC/USD");
    assert_eq!(rows.keys().copied().collect::<Vec<_>>(), (0..40).collect::<Vec<_>>());

    let closes: Vec<f64> = closes_by_minute(&btc).values().copied().collect();
    for (minute, row) in &rows {
        let m = *minute as usize;
        for field in Candle::FIELD_NAMES {
            assert!(row.get(field).is_some(), "minute {} lacks {}", m, field);
        }
        assert_eq!(number(row, "close"), Some(closes[m]));
        assert_eq!(number(row, "open"), Some(btc[m * 5].price));

        match number(row, "sma_14") {
            Some(sma) => {
                assert!(m >= 13, "sma_14 at minute {}", m);
                assert!((sma - mean(&closes[m - 13..=m])).abs() < 1e-9);
            }
            None => assert!(m < 13, "sma_14 missing at minute {}", m),
        }
        assert_eq!(row.get("adx_14").is_some(), m >= 27, "adx_14 at {}", m);
        assert_eq!(row.get("macd_10_line").is_some(), m >= 31, "macd at {}", m);
        assert!(row.payload.values().all(|v| !v.is_null()));
    }

    let eth_rows = rows_by_minute(&received, "ETH/USD");
    assert_eq!(eth_rows.len(), 40);
    assert!(number(&eth_rows[&3], "low").unwrap() > 1_000.0);
}

#[tokio::test]
async fn test_restart_resumes_windows_and_history() {
    let harness = PipelineHarness::new(2).unwrap();
    let first = minute_trades("BTC/USD", 0..21, 4, 100.0);
    let second = minute_trades("BTC/USD", 21..41, 4, 100.0);
    let all: Vec<Trade> = first.iter().chain(second.iter()).cloned().collect();
    let closes: Vec<f64> = closes_by_minute(&all).values().copied().collect();

    harness.publish(&first).await.unwrap();
    let sink = Arc::new(CollectorSink::new());
    harness.run_until(sink.clone(), 20, TIMEOUT).await.unwrap();
    let before = rows_by_minute(&sink.received_messages(), "BTC/USD");
    assert_eq!(before.keys().copied().collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
    assert!(before[&19].get("macd_10_line").is_none());

    harness.publish(&second).await.unwrap();
    let resumed = Arc::new(CollectorSink::new());
    harness.run_until(resumed.clone(), 20, TIMEOUT).await.unwrap();
    let after = rows_by_minute(&resumed.received_messages(), "BTC/USD");
    assert_eq!(after.keys().copied().collect::<Vec<_>>(), (20..40).collect::<Vec<_>>());

    // Minute 20 was open at shutdown; its first trades came from the first run
    let minute_20 = &after[&20];
    assert_eq!(number(minute_20, "open"), Some(first[80].price));
    assert_eq!(number(minute_20, "close"), Some(closes[20]));
    assert!((number(minute_20, "sma_14").unwrap() - mean(&closes[7..=20])).abs() < 1e-9);

    // Needs 32 candles, 20 of which only the restored history holds
    assert!(after[&31].get("macd_10_line").is_some());
}

#[tokio::test]
async fn test_current_mode_streams_window_updates() {
    let mut harness = PipelineHarness::new(1).unwrap();
    harness.config.candles.emit_mode = EmitMode::Current;
    let trades = minute_trades("SOL/USD", 0..3, 3, 20.0);
    harness.publish(&trades).await.unwrap();

    let sink = Arc::new(CollectorSink::new());
    harness.run_until(sink.clone(), 9, TIMEOUT).await.unwrap();
    let received = sink.received_messages();
    assert_eq!(received.len(), 9);

    // Each update of a window replaces it in the history, so the volume
    // grows within a minute and the last update carries the close
    let closes = closes_by_minute(&trades);
    for (i, row) in received.iter().enumerate() {
        let minute = (i / 3) as i64;
        assert_eq!(number(row, "window_start_ms"), Some((minute * MINUTE_MS) as f64));
        if i % 3 == 2 {
            assert_eq!(number(row, "close"), Some(closes[&minute]));
        }
        assert!(row.get("sma_14").is_none());
    }
}
