//! Candle initializer and reducer
//!
//! Plain `f64` arithmetic in a fixed order, so the same trade sequence always
//! produces bit-identical candles.

use types::{Candle, Trade, WindowBounds};

/// Initializer/reducer pair driven by the windowing engine
pub trait CandleAggregator {
    /// Candle for the first trade of a window
    fn initialize(&self, trade: &Trade, bounds: WindowBounds) -> Candle;

    /// Fold one more trade of the same window into `candle`
    fn reduce(&self, candle: &Candle, trade: &Trade) -> Candle;
}

/// Standard open/high/low/close/volume aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct OhlcvAggregator;

impl CandleAggregator for OhlcvAggregator {
    fn initialize(&self, trade: &Trade, bounds: WindowBounds) -> Candle {
        init_candle(trade, bounds)
    }

    fn reduce(&self, candle: &Candle, trade: &Trade) -> Candle {
        update_candle(candle, trade)
    }
}

pub fn init_candle(trade: &Trade, bounds: WindowBounds) -> Candle {
    Candle {
        pair: trade.pair.clone(),
        window_start_ms: bounds.start_ms,
        window_end_ms: bounds.end_ms,
        open: trade.price,
        high: trade.price,
        low: trade.price,
        close: trade.price,
        volume: trade.volume,
        timestamp_ms: trade.timestamp_ms,
        candle_interval_seconds: (bounds.duration_ms() / 1000) as u64,
    }
}

/// Close follows arrival order; `timestamp_ms` keeps the latest trade time
/// seen even when trades inside the window arrive out of order
pub fn update_candle(candle: &Candle, trade: &Trade) -> Candle {
    Candle {
        pair: candle.pair.clone(),
        window_start_ms: candle.window_start_ms,
        window_end_ms: candle.window_end_ms,
        open: candle.open,
        high: candle.high.max(trade.price),
        low: candle.low.min(trade.price),
        close: trade.price,
        volume: candle.volume + trade.volume,
        timestamp_ms: candle.timestamp_ms.max(trade.timestamp_ms),
        candle_interval_seconds: candle.candle_interval_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bounds() -> WindowBounds {
        WindowBounds::containing(60_500, 60_000).unwrap()
    }

    #[test]
    fn test_initializer_sets_all_prices() {
        let candle = init_candle(&Trade::new("BTC/USD", 100.0, 0.5, 60_500), bounds());
        assert_eq!(
            (candle.open, candle.high, candle.low, candle.close),
            (100.0, 100.0, 100.0, 100.0)
        );
        assert_eq!(candle.volume, 0.5);
        assert_eq!((candle.window_start_ms, candle.window_end_ms), (60_000, 120_000));
        assert_eq!(candle.candle_interval_seconds, 60);
    }

    #[test]
    fn test_reducer_keeps_open_and_tracks_extremes() {
        let agg = OhlcvAggregator;
        let mut candle = agg.initialize(&Trade::new("BTC/USD", 100.0, 1.0, 61_000), bounds());
        for (price, ts) in [(105.0, 62_000), (95.0, 61_500), (102.0, 63_000)] {
            candle = agg.reduce(&candle, &Trade::new("BTC/USD", price, 1.0, ts));
        }
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 105.0);
        assert_eq!(candle.low, 95.0);
        assert_eq!(candle.close, 102.0);
        assert_eq!(candle.volume, 4.0);
        assert_eq!(candle.timestamp_ms, 63_000);
    }

    proptest! {
        #[test]
        fn prop_low_le_open_close_le_high(
            prices in prop::collection::vec(0.01f64..1_000_000.0, 1..50),
            volumes in prop::collection::vec(0.0f64..100.0, 50),
        ) {
            let agg = OhlcvAggregator;
            let trades: Vec<Trade> = prices
                .iter()
                .zip(&volumes)
                .enumerate()
                .map(|(i, (p, v))| Trade::new("ETH/USD", *p, *v, 60_000 + i as i64))
                .collect();

            let mut candle = agg.initialize(&trades[0], bounds());
            for trade in &trades[1..] {
                candle = agg.reduce(&candle, trade);
            }

            prop_assert!(candle.low <= candle.open && candle.open <= candle.high);
            prop_assert!(candle.low <= candle.close && candle.close <= candle.high);
            prop_assert_eq!(candle.open, prices[0]);
            prop_assert_eq!(candle.close, *prices.last().unwrap());

            // Same sequence, same bits
            let mut again = agg.initialize(&trades[0], bounds());
            for trade in &trades[1..] {
                again = agg.reduce(&again, trade);
            }
            prop_assert_eq!(candle.volume.to_bits(), again.volume.to_bits());
        }
    }
}
