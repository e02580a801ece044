//! Indicator values and the indicator-enriched candle record

use crate::common::errors::ValidationError;
use crate::market::candle::Candle;
use serde::Serialize;
use std::collections::BTreeMap;

/// Named scalar indicator values computed for one candle.
///
/// Only finite values are ever stored; a key that is absent means the
/// indicator was not computable for this candle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndicatorSet {
    values: BTreeMap<String, f64>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, refusing non-finite numbers and candle field names
    pub fn insert(&mut self, name: &str, value: f64) -> Result<(), ValidationError> {
        if Candle::FIELD_NAMES.contains(&name) {
            return Err(ValidationError::ReservedIndicatorName {
                name: name.to_string(),
            });
        }
        if !value.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "indicator",
                value,
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Candle fields merged with the indicators computed from its history.
///
/// Serializes as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedCandle {
    #[serde(flatten)]
    pub candle: Candle,
    #[serde(flatten)]
    pub indicators: IndicatorSet,
}

impl EnrichedCandle {
    pub fn new(candle: Candle, indicators: IndicatorSet) -> Self {
        Self { candle, indicators }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ValidationError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle() -> Candle {
        Candle {
            pair: "BTC/USD".to_string(),
            window_start_ms: 0,
            window_end_ms: 60_000,
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 102.0,
            volume: 4.0,
            timestamp_ms: 59_000,
            candle_interval_seconds: 60,
        }
    }

    #[test]
    fn test_reserved_names_rejected() {
        let mut set = IndicatorSet::new();
        assert!(matches!(
            set.insert("close", 1.0),
            Err(ValidationError::ReservedIndicatorName { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut set = IndicatorSet::new();
        assert!(set.insert("rsi_14", f64::NAN).is_err());
        assert!(set.insert("rsi_14", f64::INFINITY).is_err());
        assert!(!set.contains("rsi_14"));
    }

    #[test]
    fn test_enriched_candle_serializes_flat() {
        let mut set = IndicatorSet::new();
        set.insert("sma_14", 101.5).unwrap();
        let enriched = EnrichedCandle::new(candle(), set);

        let value: serde_json::Value =
            serde_json::from_slice(&enriched.to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["pair"], "BTC/USD");
        assert_eq!(object["close"], 102.0);
        assert_eq!(object["sma_14"], 101.5);
        assert!(!object.contains_key("rsi_14"));
        assert_eq!(object.len(), Candle::FIELD_NAMES.len() + 1);
    }
}
