//! Moving averages and the indicators built on them

use super::{ensure_len, mean, IndicatorResult};

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(values, period.max(1))?;
    Ok(mean(&values[values.len() - period..]))
}

/// EMA at every index from `period - 1` on, seeded with the SMA of the first
/// `period` values
pub fn ema_series(values: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    ensure_len(values, period.max(1))?;
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = mean(&values[..period]);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(current);
    for value in &values[period..] {
        current = value * k + current * (1.0 - k);
        out.push(current);
    }
    Ok(out)
}

pub fn ema(values: &[f64], period: usize) -> IndicatorResult<f64> {
    let series = ema_series(values, period)?;
    // ema_series never returns an empty vector
    Ok(series[series.len() - 1])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Candles needed for a MACD with the given slow and signal periods
pub const fn macd_required(slow: usize, signal: usize) -> usize {
    slow + signal - 1
}

/// MACD line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line.
///
/// The fast EMA is seeded over the `fast` bars ending where the slow seed
/// ends, so both start at index `slow - 1` and the line has no warm-up.
pub fn macd(close: &[f64], fast: usize, slow: usize, signal: usize) -> IndicatorResult<Macd> {
    ensure_len(close, macd_required(slow, signal))?;
    let slow_ema = ema_series(close, slow)?;
    let fast_ema = ema_series(&close[slow.saturating_sub(fast)..], fast)?;

    let line: Vec<f64> = slow_ema
        .iter()
        .zip(&fast_ema)
        .map(|(slow_value, fast_value)| fast_value - slow_value)
        .collect();

    let signal_value = ema(&line, signal)?;
    let line_value = line[line.len() - 1];
    Ok(Macd {
        line: line_value,
        signal: signal_value,
        histogram: line_value - signal_value,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands: SMA ± `num_std` population standard deviations
pub fn bollinger(close: &[f64], period: usize, num_std: f64) -> IndicatorResult<Bands> {
    ensure_len(close, period.max(1))?;
    let window = &close[close.len() - period..];
    let middle = mean(window);
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let width = num_std * variance.sqrt();
    Ok(Bands {
        upper: middle + width,
        middle,
        lower: middle - width,
    })
}
