//! Seeded random-walk trade generator

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use service_config::TradesConfig;
use types::Trade;

/// Largest relative price move between two trades of one pair
const MAX_STEP: f64 = 0.002;

#[derive(Debug, Clone)]
struct PairWalk {
    pair: String,
    price: f64,
}

/// Produces trades for a fixed set of pairs, taking turns between them
#[derive(Debug)]
pub struct TradeGenerator {
    walks: Vec<PairWalk>,
    rng: StdRng,
    next: usize,
}

impl TradeGenerator {
    pub fn new(pairs: &[String], start_price: f64, seed: Option<u64>) -> Result<Self> {
        if pairs.is_empty() {
            bail!("trade generator needs at least one pair");
        }
        if !(start_price.is_finite() && start_price > 0.0) {
            bail!("start price must be positive, got {}", start_price);
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            walks: pairs
                .iter()
                .map(|pair| PairWalk {
                    pair: pair.clone(),
                    price: start_price,
                })
                .collect(),
            rng,
            next: 0,
        })
    }

    pub fn from_config(config: &TradesConfig) -> Result<Self> {
        Self::new(&config.pairs, config.start_price, config.seed)
    }

    /// Next trade, stamped with `timestamp_ms`
    pub fn next_trade(&mut self, timestamp_ms: i64) -> Trade {
        let index = self.next;
        self.next = (self.next + 1) % self.walks.len();

        let step = self.rng.gen_range(-MAX_STEP..MAX_STEP);
        let volume = self.rng.gen_range(0.001..2.0);
        let walk = &mut self.walks[index];
        walk.price *= 1.0 + step;
        Trade::new(walk.pair.clone(), walk.price, volume, timestamp_ms)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.walks.iter().map(|w| w.pair.as_str())
    }
}
