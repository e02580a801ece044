//! Indicator engine: runs the battery over one candle history

use crate::battery::{IndicatorEntry, BATTERY};
use crate::indicators::{IndicatorError, Series};
use tracing::{debug, trace};
use types::{Candle, IndicatorSet};

/// Stateless evaluator of an indicator table.
///
/// Every entry is computed in isolation: a short history, a non-finite input
/// or a numeric failure drops that entry's keys and nothing else.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorEngine {
    battery: &'static [IndicatorEntry],
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self { battery: &BATTERY }
    }

    pub fn with_battery(battery: &'static [IndicatorEntry]) -> Self {
        Self { battery }
    }

    /// Longest lookback of the configured battery
    pub fn max_required(&self) -> usize {
        self.battery.iter().map(|entry| entry.required).max().unwrap_or(0)
    }

    /// Compute every computable indicator from an oldest-first history
    pub fn compute(&self, history: &[Candle]) -> IndicatorSet {
        let series = Series::from_candles(history);
        let mut out = IndicatorSet::new();

        for entry in self.battery {
            if series.len() < entry.required {
                trace!(
                    "{:?}: {} of {} candles",
                    entry.keys,
                    series.len(),
                    entry.required
                );
                continue;
            }

            let columns = series.tail(entry.required);
            if !columns.all_finite(entry.inputs) {
                debug!("{:?}: non-finite input, omitted", entry.keys);
                continue;
            }

            match (entry.compute)(&columns) {
                Ok(values) => insert_group(&mut out, entry, &values),
                Err(IndicatorError::InsufficientHistory { .. }) => {}
                Err(e @ IndicatorError::Numeric { .. }) => {
                    debug!("{:?} omitted: {}", entry.keys, e);
                }
            }
        }
        out
    }
}

/// All-or-nothing insert of one entry's values
fn insert_group(out: &mut IndicatorSet, entry: &IndicatorEntry, values: &[f64]) {
    if values.len() != entry.keys.len() || values.iter().any(|v| !v.is_finite()) {
        debug!("{:?}: undefined result, omitted", entry.keys);
        return;
    }
    let mut staged = out.clone();
    for (key, value) in entry.keys.iter().zip(values) {
        if let Err(e) = staged.insert(key, *value) {
            debug!("{:?} omitted: {}", entry.keys, e);
            return;
        }
    }
    *out = staged;
}
