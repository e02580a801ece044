//! Deterministic trade streams and row helpers

use message_sink::Message;
use std::collections::BTreeMap;
use std::ops::Range;
use types::Trade;

pub const MINUTE_MS: i64 = 60_000;

/// `per_minute` trades in each minute of `minutes`, one second apart, prices
/// following a slow wave so every indicator has something to measure
pub fn minute_trades(pair: &str, minutes: Range<i64>, per_minute: i64, base: f64) -> Vec<Trade> {
    let mut trades = Vec::new();
    for minute in minutes {
        for k in 0..per_minute {
            let price =
                base + (minute as f64 * 0.9).sin() * 3.0 + minute as f64 * 0.05 + k as f64 * 0.01;
            let volume = 0.1 + ((minute + k) % 5) as f64 * 0.2;
            trades.push(Trade::new(
                pair,
                price,
                volume,
                minute * MINUTE_MS + k * 1_000,
            ));
        }
    }
    trades
}

/// Close price per minute: the last trade of each minute
pub fn closes_by_minute(trades: &[Trade]) -> BTreeMap<i64, f64> {
    let mut closes = BTreeMap::new();
    for trade in trades {
        closes.insert(trade.timestamp_ms.div_euclid(MINUTE_MS), trade.price);
    }
    closes
}

/// Rows for one pair keyed by window start minute; later copies win
pub fn rows_by_minute(rows: &[Message], pair: &str) -> BTreeMap<i64, Message> {
    rows.iter()
        .filter(|row| row.key == pair)
        .filter_map(|row| {
            let start = row.get("window_start_ms")?.as_i64()?;
            Some((start.div_euclid(MINUTE_MS), row.clone()))
        })
        .collect()
}

pub fn number(row: &Message, column: &str) -> Option<f64> {
    row.get(column).and_then(|v| v.as_f64())
}
