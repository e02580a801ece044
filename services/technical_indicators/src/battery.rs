//! The fixed indicator battery
//!
//! Each entry names its output keys, the candles it needs and the columns it
//! reads. An entry only ever sees its newest `required` candles, so a value
//! depends on the lookback and never on how much history is kept.

use crate::indicators::{
    momentum, moving,
    volatility::{self, adx_required},
    Columns, Field, IndicatorResult,
};

const MACD_FAST: usize = 10;
const MACD_SLOW: usize = 24;
const MACD_SIGNAL: usize = 9;
const BAND_STD: f64 = 2.0;

const CLOSE: &[Field] = &[Field::Close];
const HLC: &[Field] = &[Field::High, Field::Low, Field::Close];
const HLCV: &[Field] = &[Field::High, Field::Low, Field::Close, Field::Volume];

pub type ComputeFn = fn(&Columns<'_>) -> IndicatorResult<Vec<f64>>;

#[derive(Debug, Clone, Copy)]
pub struct IndicatorEntry {
    /// Output keys, in the order `compute` returns values
    pub keys: &'static [&'static str],
    /// Minimum history length
    pub required: usize,
    /// Columns that must be finite over the last `required` bars
    pub inputs: &'static [Field],
    pub compute: ComputeFn,
}

fn sma_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![moving::sma(c.close, 14)?])
}

fn rsi_9(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::rsi(c.close, 9)?])
}

fn rsi_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::rsi(c.close, 14)?])
}

fn rsi_21(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::rsi(c.close, 21)?])
}

fn macd_10(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    let m = moving::macd(c.close, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
    Ok(vec![m.line, m.signal, m.histogram])
}

fn bands(c: &Columns<'_>, period: usize) -> IndicatorResult<Vec<f64>> {
    let b = moving::bollinger(c.close, period, BAND_STD)?;
    Ok(vec![b.upper, b.middle, b.lower])
}

fn bands_10(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    bands(c, 10)
}

fn bands_15(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    bands(c, 15)
}

fn bands_20(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    bands(c, 20)
}

fn adx_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![volatility::adx(c.high, c.low, c.close, 14)?])
}

fn ema_10(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![moving::ema(c.close, 10)?])
}

fn atr_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![volatility::atr(c.high, c.low, c.close, 14)?])
}

fn roc_10(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::rate_of_change(c.close, 10)?])
}

fn mfi_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::money_flow_index(c.high, c.low, c.close, c.volume, 14)?])
}

fn willr_14(c: &Columns<'_>) -> IndicatorResult<Vec<f64>> {
    Ok(vec![momentum::williams_r(c.high, c.low, c.close, 14)?])
}

pub static BATTERY: [IndicatorEntry; 14] = [
    IndicatorEntry {
        keys: &["sma_14"],
        required: 14,
        inputs: CLOSE,
        compute: sma_14,
    },
    IndicatorEntry {
        keys: &["rsi_9"],
        required: 10,
        inputs: CLOSE,
        compute: rsi_9,
    },
    IndicatorEntry {
        keys: &["rsi_14"],
        required: 15,
        inputs: CLOSE,
        compute: rsi_14,
    },
    IndicatorEntry {
        keys: &["rsi_21"],
        required: 22,
        inputs: CLOSE,
        compute: rsi_21,
    },
    IndicatorEntry {
        keys: &["macd_10_line", "macd_10_signal", "macd_10_hist"],
        required: moving::macd_required(MACD_SLOW, MACD_SIGNAL),
        inputs: CLOSE,
        compute: macd_10,
    },
    IndicatorEntry {
        keys: &["upper_band_10", "middle_band_10", "lower_band_10"],
        required: 10,
        inputs: CLOSE,
        compute: bands_10,
    },
    IndicatorEntry {
        keys: &["upper_band_15", "middle_band_15", "lower_band_15"],
        required: 15,
        inputs: CLOSE,
        compute: bands_15,
    },
    IndicatorEntry {
        keys: &["upper_band_20", "middle_band_20", "lower_band_20"],
        required: 20,
        inputs: CLOSE,
        compute: bands_20,
    },
    IndicatorEntry {
        keys: &["adx_14"],
        required: adx_required(14),
        inputs: HLC,
        compute: adx_14,
    },
    IndicatorEntry {
        keys: &["ema_10"],
        required: 10,
        inputs: CLOSE,
        compute: ema_10,
    },
    IndicatorEntry {
        keys: &["atr_14"],
        required: 15,
        inputs: HLC,
        compute: atr_14,
    },
    IndicatorEntry {
        keys: &["price_roc_10"],
        required: 11,
        inputs: CLOSE,
        compute: roc_10,
    },
    IndicatorEntry {
        keys: &["mfi_14"],
        required: 15,
        inputs: HLCV,
        compute: mfi_14,
    },
    IndicatorEntry {
        keys: &["willr_14"],
        required: 14,
        inputs: HLC,
        compute: willr_14,
    },
];

/// Longest history any indicator needs; the history capacity must be at
/// least this large
pub fn max_required() -> usize {
    BATTERY.iter().map(|entry| entry.required).max().unwrap_or(0)
}

/// Every output key of the battery
pub fn all_keys() -> impl Iterator<Item = &'static str> {
    BATTERY.iter().flat_map(|entry| entry.keys.iter().copied())
}
