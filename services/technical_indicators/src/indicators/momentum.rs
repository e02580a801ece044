//! Momentum oscillators: RSI, rate of change, Williams %R, money flow index

use super::{ensure_len, wilder_step, IndicatorError, IndicatorResult};

/// Wilder RSI over the whole series; needs `period + 1` closes.
///
/// A market without losses reads 100, a market without any movement 50.
pub fn rsi(close: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(close, period + 1)?;
    let changes: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();

    let (mut avg_gain, mut avg_loss) = changes[..period]
        .iter()
        .fold((0.0, 0.0), |(g, l), c| (g + c.max(0.0), l + (-c).max(0.0)));
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for change in &changes[period..] {
        avg_gain = wilder_step(avg_gain, change.max(0.0), period);
        avg_loss = wilder_step(avg_loss, (-change).max(0.0), period);
    }

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// Percent change of the last close against the close `period` bars earlier
pub fn rate_of_change(close: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(close, period + 1)?;
    let last = close[close.len() - 1];
    let reference = close[close.len() - 1 - period];
    if reference == 0.0 {
        return Err(IndicatorError::Numeric {
            indicator: "roc",
            reason: "reference close is zero",
        });
    }
    Ok((last - reference) / reference * 100.0)
}

/// Williams %R in [-100, 0] over the last `period` bars
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<f64> {
    ensure_len(close, period.max(1))?;
    let start = close.len() - period;
    let highest = high[start..].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest = low[start..].iter().copied().fold(f64::INFINITY, f64::min);
    let range = highest - lowest;
    if range == 0.0 {
        return Err(IndicatorError::Numeric {
            indicator: "willr",
            reason: "high-low range is zero",
        });
    }
    Ok((highest - close[close.len() - 1]) / range * -100.0)
}

/// Money flow index over the last `period` typical-price changes
pub fn money_flow_index(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    period: usize,
) -> IndicatorResult<f64> {
    ensure_len(close, period + 1)?;
    let start = close.len() - period - 1;
    let typical = |i: usize| (high[i] + low[i] + close[i]) / 3.0;

    let mut positive = 0.0;
    let mut negative = 0.0;
    for i in start + 1..close.len() {
        let (current, previous) = (typical(i), typical(i - 1));
        let flow = current * volume[i];
        if current > previous {
            positive += flow;
        } else if current < previous {
            negative += flow;
        }
    }

    let total = positive + negative;
    if total == 0.0 {
        return Err(IndicatorError::Numeric {
            indicator: "mfi",
            reason: "no money flow",
        });
    }
    Ok(100.0 * positive / total)
}
