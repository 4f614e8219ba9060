use std::collections::HashMap;

use adya_core::history::{Mop, Txn, TxnId};
use chrono::{DateTime, Duration, Local};
use rand::distr::{Distribution, Uniform};
use rand::Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// How keys are drawn from the active-key pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDist {
    /// All active keys equally likely.
    Uniform,
    /// Lower-indexed active keys exponentially more likely.
    #[default]
    Exponential,
}

#[derive(Clone, Debug, Deserialize, Serialize, TypedBuilder)]
pub struct GeneratorParams {
    #[builder(default)]
    #[serde(default)]
    pub key_dist: KeyDist,
    /// Base of the exponential key distribution.
    #[builder(default = 2.0)]
    pub key_dist_base: f64,
    /// Size of the active-key pool. Defaults to 10 for the exponential
    /// distribution and 3 for the uniform one.
    #[builder(default)]
    #[serde(default)]
    pub key_count: Option<u64>,
    #[builder(default = 1)]
    pub min_txn_length: u64,
    #[builder(default = 2)]
    pub max_txn_length: u64,
    /// Writes a key absorbs before it is retired from the pool.
    #[builder(default = 32)]
    pub max_writes_per_key: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GeneratorParams {
    fn effective_key_count(&self) -> u64 {
        self.key_count.unwrap_or(match self.key_dist {
            KeyDist::Uniform => 3,
            KeyDist::Exponential => 10,
        })
    }
}

/// Emits random read/write transactions over a rotating pool of keys.
///
/// Writes to a key increment a per-key counter starting at 1, so every
/// written value is unique per key across the history. A key that has
/// absorbed `max_writes_per_key` writes is replaced in the pool by
/// `max(active) + 1`.
pub struct Generator<R> {
    params: GeneratorParams,
    rng: R,
    active: Vec<u64>,
    key_index: Uniform<usize>,
    write_counts: HashMap<u64, u64>,
    last_value: HashMap<u64, u64>,
    next_index: u64,
}

impl Generator<rand::rngs::ThreadRng> {
    #[must_use]
    pub fn new(params: GeneratorParams) -> Self {
        Self::with_rng(params, rand::rng())
    }
}

impl<R: Rng> Generator<R> {
    /// # Panics
    ///
    /// Panics on a degenerate configuration: no keys, an exponential base
    /// not greater than 1, or `min_txn_length > max_txn_length`.
    pub fn with_rng(params: GeneratorParams, rng: R) -> Self {
        let key_count = params.effective_key_count();
        assert!(key_count > 0, "key pool must not be empty");
        assert!(
            params.key_dist_base > 1.0,
            "exponential key distribution needs a base > 1"
        );
        assert!(
            params.min_txn_length <= params.max_txn_length,
            "transaction length range is inverted"
        );

        #[allow(clippy::cast_possible_truncation)]
        let key_index = Uniform::new(0, key_count as usize).expect("key pool is non-empty");
        Self {
            active: (0..key_count).collect(),
            key_index,
            write_counts: HashMap::new(),
            last_value: HashMap::new(),
            next_index: 0,
            params,
            rng,
        }
    }

    /// Emits the next transaction: a uniformly random number of
    /// micro-ops, each an equally likely read or write of a drawn key.
    pub fn next_txn(&mut self) -> Txn<u64, u64> {
        let length = self
            .rng
            .random_range(self.params.min_txn_length..=self.params.max_txn_length);
        let mops = (0..length)
            .map(|_| {
                if self.rng.random::<bool>() {
                    let key = self.pick_key();
                    Mop::read_empty(key)
                } else {
                    self.write()
                }
            })
            .collect();

        let id = TxnId(self.next_index);
        self.next_index += 1;
        Txn::committed(id, mops)
    }

    fn write(&mut self) -> Mop<u64, u64> {
        let mut key = self.pick_key();
        if self.write_counts.get(&key).copied().unwrap_or(0) >= self.params.max_writes_per_key {
            key = self.retire(key);
        }
        *self.write_counts.entry(key).or_insert(0) += 1;
        let value = self.last_value.entry(key).or_insert(0);
        *value += 1;
        Mop::write(key, *value)
    }

    /// Swaps `key` out of the active pool for a fresh one and returns it.
    fn retire(&mut self, key: u64) -> u64 {
        let fresh = self.active.iter().max().copied().unwrap_or(0) + 1;
        let slot = self
            .active
            .iter()
            .position(|k| *k == key)
            .expect("retired key is active");
        self.active[slot] = fresh;
        fresh
    }

    fn pick_key(&mut self) -> u64 {
        let index = match self.params.key_dist {
            KeyDist::Uniform => self.key_index.sample(&mut self.rng),
            KeyDist::Exponential => self.exponential_index(),
        };
        self.active[index]
    }

    /// Draws an index with P(i) proportional to b^-i: with base b and n
    /// keys, scale s = b(b^n - 1)/(b - 1), draw u in [0, s), and take
    /// floor(log_b(u + b) - 1).
    fn exponential_index(&mut self) -> usize {
        let b = self.params.key_dist_base;
        #[allow(clippy::cast_precision_loss)]
        let n = self.active.len() as f64;
        let scale = b * (b.powf(n) - 1.0) / (b - 1.0);
        let u = self.rng.random_range(0.0..scale);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = ((u + b).log(b) - 1.0).floor() as usize;
        index.min(self.active.len() - 1)
    }
}

/// A generated history with its parameters and generation timestamps.
#[derive(Debug, Deserialize, Serialize)]
pub struct History {
    id: u64,
    params: GeneratorParams,
    n_txns: u64,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    data: Vec<Txn<u64, u64>>,
}

impl History {
    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn get_data(&self) -> &Vec<Txn<u64, u64>> {
        &self.data
    }

    #[must_use]
    pub const fn get_params(&self) -> &GeneratorParams {
        &self.params
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Generates one history of `n_txns` transactions.
#[must_use]
pub fn generate_history(id: u64, params: &GeneratorParams, n_txns: u64) -> History {
    let start = Local::now();
    let mut generator = Generator::new(params.clone());
    let data = (0..n_txns).map(|_| generator.next_txn()).collect();
    let end = Local::now();
    History {
        id,
        params: params.clone(),
        n_txns,
        info: "generated".to_string(),
        start,
        end,
        data,
    }
}

/// Generates `n_hist` histories in parallel.
#[must_use]
pub fn generate_mult_histories(n_hist: u64, params: &GeneratorParams, n_txns: u64) -> Vec<History> {
    (0..n_hist)
        .into_par_iter()
        .map(|id| generate_history(id, params, n_txns))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn seeded(params: GeneratorParams, seed: u64) -> Generator<StdRng> {
        Generator::with_rng(params, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn written_values_are_unique_per_key() {
        let mut generator = seeded(GeneratorParams::default(), 7);
        let mut seen: HashMap<u64, Vec<u64>> = HashMap::new();
        for _ in 0..500 {
            for mop in generator.next_txn().mops {
                if let Mop::Write { key, value } = mop {
                    let values = seen.entry(key).or_default();
                    assert!(!values.contains(&value), "duplicate {value} for key {key}");
                    values.push(value);
                }
            }
        }
    }

    #[test]
    fn txn_indices_are_monotonic_and_lengths_bounded() {
        let params = GeneratorParams::builder()
            .min_txn_length(1)
            .max_txn_length(4)
            .build();
        let mut generator = seeded(params, 11);
        for expected in 0..100u64 {
            let txn = generator.next_txn();
            assert_eq!(txn.id, TxnId(expected));
            assert!((1..=4).contains(&(txn.mops.len() as u64)));
            assert!(txn.is_committed());
        }
    }

    #[test]
    fn exhausted_keys_are_retired() {
        let params = GeneratorParams::builder()
            .key_dist(KeyDist::Uniform)
            .key_count(Some(2))
            .max_writes_per_key(1)
            .build();
        let mut generator = seeded(params, 3);
        let mut written: Vec<u64> = Vec::new();
        for _ in 0..200 {
            for mop in generator.next_txn().mops {
                if let Mop::Write { key, .. } = mop {
                    written.push(key);
                }
            }
        }
        // with a write budget of 1 per key, the pool must rotate past the
        // two initial keys
        assert!(written.iter().any(|key| *key >= 2), "no key was retired");
    }

    #[test]
    fn exponential_draw_prefers_low_indices() {
        let params = GeneratorParams::builder()
            .key_dist(KeyDist::Exponential)
            .max_writes_per_key(u64::MAX)
            .build();
        let mut generator = seeded(params, 5);
        let mut counts: HashMap<u64, u64> = HashMap::new();
        for _ in 0..2000 {
            let key = generator.pick_key();
            *counts.entry(key).or_insert(0) += 1;
        }
        let first = counts.get(&0).copied().unwrap_or(0);
        let last = counts.get(&9).copied().unwrap_or(0);
        assert!(
            first > last,
            "expected key 0 ({first} draws) to dominate key 9 ({last} draws)"
        );
    }

    #[test]
    fn exponential_index_stays_in_bounds() {
        let params = GeneratorParams::builder().key_count(Some(4)).build();
        let mut generator = seeded(params, 13);
        for _ in 0..10_000 {
            assert!(generator.exponential_index() < 4);
        }
    }

    #[test]
    #[should_panic(expected = "base > 1")]
    fn degenerate_base_is_rejected() {
        let params = GeneratorParams::builder().key_dist_base(1.0).build();
        let _ = seeded(params, 0);
    }

    #[test]
    fn histories_serialize() {
        let history = generate_history(0, &GeneratorParams::default(), 10);
        let json = serde_json::to_string(&history).unwrap();
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_id(), 0);
        assert_eq!(back.get_data().len(), 10);
    }
}
