//! Market records: trades in, candles and enriched candles out.

pub mod candle;
pub mod indicators;
pub mod trade;
