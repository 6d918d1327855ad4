use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SampleConfig;

/// Uniform sample without replacement of `min(n, records.len())` items.
/// Order of the result is unspecified.
pub fn sample<T: Clone, R: Rng + ?Sized>(records: &[T], n: usize, rng: &mut R) -> Vec<T> {
    records.choose_multiple(rng, n).cloned().collect()
}

/// Requested size, falling back to the configured default and capped at the
/// configured maximum.
pub fn effective_size(requested: Option<usize>, cfg: &SampleConfig) -> usize {
    requested.unwrap_or(cfg.default_size).min(cfg.max_size)
}
