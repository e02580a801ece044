//! True-range based indicators: ATR and ADX (Wilder)

use super::{ensure_len, mean, true_range, wilder_step, IndicatorError, IndicatorResult};

/// Average true range; needs `period + 1` bars
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(close, period + 1)?;
    let ranges: Vec<f64> = (1..close.len())
        .map(|i| true_range(high, low, close, i))
        .collect();

    let mut average = mean(&ranges[..period]);
    for range in &ranges[period..] {
        average = wilder_step(average, *range, period);
    }
    Ok(average)
}

/// Candles needed for an ADX of the given period
pub const fn adx_required(period: usize) -> usize {
    2 * period
}

/// Average directional index.
///
/// Directional movement and true range are Wilder-summed starting with the
/// first `period` moves; the ADX is the average of the first `period` DX
/// values, Wilder-smoothed afterwards.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(close, adx_required(period).max(2))?;
    let p = period as f64;

    let mut plus_dm = Vec::with_capacity(close.len() - 1);
    let mut minus_dm = Vec::with_capacity(close.len() - 1);
    let mut ranges = Vec::with_capacity(close.len() - 1);
    for i in 1..close.len() {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        ranges.push(true_range(high, low, close, i));
    }

    let mut sum_tr: f64 = ranges[..period].iter().sum();
    let mut sum_plus: f64 = plus_dm[..period].iter().sum();
    let mut sum_minus: f64 = minus_dm[..period].iter().sum();

    let mut dx_values = Vec::with_capacity(ranges.len() - period + 1);
    dx_values.push(directional_index(sum_tr, sum_plus, sum_minus)?);
    for i in period..ranges.len() {
        sum_tr = sum_tr - sum_tr / p + ranges[i];
        sum_plus = sum_plus - sum_plus / p + plus_dm[i];
        sum_minus = sum_minus - sum_minus / p + minus_dm[i];
        dx_values.push(directional_index(sum_tr, sum_plus, sum_minus)?);
    }

    let mut average = mean(&dx_values[..period]);
    for dx in &dx_values[period..] {
        average = wilder_step(average, *dx, period);
    }
    Ok(average)
}

fn directional_index(sum_tr: f64, sum_plus: f64, sum_minus: f64) -> IndicatorResult<f64> {
    if sum_tr == 0.0 {
        return Err(IndicatorError::Numeric {
            indicator: "adx",
            reason: "true range sum is zero",
        });
    }
    let plus_di = 100.0 * sum_plus / sum_tr;
    let minus_di = 100.0 * sum_minus / sum_tr;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Ok(0.0);
    }
    Ok(100.0 * (plus_di - minus_di).abs() / di_sum)
}
