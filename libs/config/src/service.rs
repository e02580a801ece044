//! Service configuration defaults
//!
//! This module contains default configuration values and constants
//! used across pipeline services for consistency.

/// Event log defaults
pub mod bus {
    /// Directory holding topic partitions and committed offsets
    pub const DATA_DIR: &str = "./data/bus";

    /// Partitions per topic
    pub const PARTITIONS: u32 = 4;

    /// Sleep between polls of an idle partition (milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 100;

    /// Maximum records returned by one poll
    pub const MAX_POLL_RECORDS: usize = 500;
}

/// Mock trade producer defaults
pub mod trades {
    pub const OUTPUT_TOPIC: &str = "trades";

    /// Trades generated per second across all pairs
    pub const TRADES_PER_SECOND: u32 = 20;

    pub const START_PRICE: f64 = 100.0;
}

/// Candle aggregation defaults
pub mod candles {
    pub const INPUT_TOPIC: &str = "trades";
    pub const OUTPUT_TOPIC: &str = "candles";
    pub const CONSUMER_GROUP: &str = "candles";

    /// Tumbling window length (seconds)
    pub const CANDLE_INTERVAL_SECONDS: u64 = 60;

    pub const STATE_DIR: &str = "./data/state/candles";
}

/// Technical indicator defaults
pub mod technical_indicators {
    pub const INPUT_TOPIC: &str = "candles";
    pub const OUTPUT_TOPIC: &str = "technical_indicators";
    pub const CONSUMER_GROUP: &str = "technical_indicators";

    /// Candles kept per (pair, interval); the MACD 10/24/9 needs 32
    pub const MAX_CANDLES_IN_STATE: usize = 32;

    pub const STATE_DIR: &str = "./data/state/technical_indicators";
}

/// Feature store sink defaults
pub mod to_feature_store {
    pub const INPUT_TOPIC: &str = "technical_indicators";
    pub const CONSUMER_GROUP: &str = "to_feature_store";
    pub const OUTPUT_PATH: &str = "./data/feature_store/technical_indicators.jsonl";

    /// Records buffered before a batch is written
    pub const BATCH_SIZE: usize = 100;

    /// Flush a partial batch after this long without new records (milliseconds)
    pub const IDLE_FLUSH_MS: u64 = 1_000;

    /// Upper bound on a single backpressure wait (milliseconds)
    pub const MAX_RETRY_AFTER_MS: u64 = 30_000;
}
