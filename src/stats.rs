use polars::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

/// Quantile of a float column with linear interpolation, nulls ignored.
pub fn quantile(s: &Series, q: f64) -> PolarsResult<Option<f64>> {
    s.f64()?.quantile(q, QuantileInterpolOptions::Linear)
}

/// Share of the column total held by its largest `floor(n * fraction)` values.
pub fn top_share(s: &Series, fraction: f64) -> Option<f64> {
    let s = s.drop_nulls();
    let total = s.sum::<f64>().unwrap_or(0.0);
    if s.is_empty() || total == 0.0 {
        return None;
    }
    let k = (s.len() as f64 * fraction) as usize;
    let top = s.sort(true).head(Some(k)).sum::<f64>().unwrap_or(0.0);
    Some(top / total)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: &'static str,
    pub count: usize,
}

/// Counts values into buckets bounded by `edges`: the first bucket is
/// `v <= edges[0]`, then `(edges[i-1], edges[i]]`, the last `v > edges[last]`.
pub fn bucketize(values: &[f64], edges: &[f64], labels: &[&'static str]) -> Vec<Bucket> {
    debug_assert_eq!(labels.len(), edges.len() + 1);
    let mut counts = vec![0usize; labels.len()];
    for v in values {
        let idx = edges.iter().position(|edge| v <= edge).unwrap_or(edges.len());
        counts[idx] += 1;
    }
    labels
        .iter()
        .copied()
        .zip(counts)
        .map(|(label, count)| Bucket { label, count })
        .collect()
}

/// Equal-width histogram over the value range.
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, usize)> {
    if values.is_empty() {
        return Vec::new();
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    let mut counts = vec![0usize; bins.max(1)];
    for v in values {
        let idx = (((v - lo) / width) as usize).min(counts.len() - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (lo + i as f64 * width, c))
        .collect()
}

/// Reproducible sample of at most `k` row indices out of `n`, ascending.
pub fn sample_indices(n: usize, k: usize, seed: u64) -> Vec<usize> {
    if k >= n {
        return (0..n).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}
