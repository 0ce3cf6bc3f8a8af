use anyhow::{Context, Result};
use cdnet::core::io::compute_targets;
use cdnet::indicators::{indicator_matrix, MaSpec};

/// Computed indicators and targets for a dataset
#[derive(Debug)]
pub struct IndicatorData {
    /// Indicator matrix: n_cases x n_vars
    pub data: Vec<f64>,
    /// Target returns: n_cases
    pub targets: Vec<f64>,
    pub n_cases: usize,
    pub n_vars: usize,
}

impl IndicatorData {
    pub fn row(&self, icase: usize) -> &[f64] {
        &self.data[icase * self.n_vars..(icase + 1) * self.n_vars]
    }
}

/// Compute both indicators and targets for `n_cases` bars from `start_idx`.
pub fn compute_indicator_data(
    prices: &[f64],
    start_idx: usize,
    n_cases: usize,
    specs: &[MaSpec],
) -> Result<IndicatorData> {
    let data = indicator_matrix(prices, start_idx, n_cases, specs)
        .context("computing indicator matrix")?;
    let targets = compute_targets(prices, start_idx, n_cases).context("computing targets")?;

    Ok(IndicatorData {
        data,
        targets,
        n_cases,
        n_vars: specs.len(),
    })
}
