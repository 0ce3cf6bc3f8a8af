use serde::{Deserialize, Serialize};

use crate::error::{CdError, Result};

/// One moving-average crossover: short-term mean minus long-term mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaSpec {
    pub short_lookback: usize,
    pub long_lookback: usize,
}

/// Build the crossover bank.
///
/// Long lookbacks run `lookback_inc, 2*lookback_inc, ...`; for each, the short
/// lookbacks are evenly spaced fractions `(ishort+1)/(n_short+1)` of it, at
/// least one bar. Ordering is long-major, which the beta report relies on.
pub fn generate_specs(lookback_inc: usize, n_long: usize, n_short: usize) -> Vec<MaSpec> {
    let mut specs = Vec::with_capacity(n_long * n_short);
    for ilong in 0..n_long {
        let long_lookback = (ilong + 1) * lookback_inc;
        for ishort in 0..n_short {
            let short_lookback = (long_lookback * (ishort + 1) / (n_short + 1)).max(1);
            specs.push(MaSpec {
                short_lookback,
                long_lookback,
            });
        }
    }
    specs
}

/// Longest lookback in a bank.
pub fn max_lookback(specs: &[MaSpec]) -> usize {
    specs.iter().map(|s| s.long_lookback).max().unwrap_or(0)
}

/// Crossover value for a window whose last element is the current bar.
///
/// The window must hold at least `long_lookback` prices.
pub fn ma_crossover(window: &[f64], spec: MaSpec) -> f64 {
    let n = window.len();
    let short_sum: f64 = window[n - spec.short_lookback..].iter().sum();
    let long_sum: f64 = window[n - spec.long_lookback..].iter().sum();
    short_sum / spec.short_lookback as f64 - long_sum / spec.long_lookback as f64
}

/// Fill one feature row from a price window ending at the current bar.
pub fn feature_row(window: &[f64], specs: &[MaSpec], row: &mut [f64]) -> Result<()> {
    let needed = max_lookback(specs);
    if window.len() < needed {
        return Err(CdError::DataLength {
            what: "price window",
            expected: needed,
            got: window.len(),
        });
    }
    if row.len() != specs.len() {
        return Err(CdError::InvalidDimensions(format!(
            "feature row has {} slots for {} indicators",
            row.len(),
            specs.len()
        )));
    }

    for (slot, spec) in row.iter_mut().zip(specs) {
        *slot = ma_crossover(window, *spec);
    }
    Ok(())
}

/// Row-major `n_cases x specs.len()` matrix; case `i` uses prices through
/// bar `start_idx + i`.
pub fn indicator_matrix(
    prices: &[f64],
    start_idx: usize,
    n_cases: usize,
    specs: &[MaSpec],
) -> Result<Vec<f64>> {
    let nvars = specs.len();
    if n_cases > 0 && start_idx + n_cases > prices.len() {
        return Err(CdError::DataLength {
            what: "price history",
            expected: start_idx + n_cases,
            got: prices.len(),
        });
    }

    let mut data = vec![0.0; n_cases * nvars];
    for (icase, row) in data.chunks_exact_mut(nvars.max(1)).enumerate().take(n_cases) {
        let current = start_idx + icase;
        feature_row(&prices[..=current], specs, row)?;
    }
    Ok(data)
}
