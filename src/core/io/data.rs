use crate::error::{CdError, Result};

/// Training and test windows over one price history.
///
/// Indices are "current" bars: the indicators of case `i` use prices up to
/// and including bar `start + i`, and its target is the change to the next bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSplit {
    pub train_start: usize,
    pub n_train: usize,
    pub test_start: usize,
    pub n_test: usize,
}

/// Split a price history so that the last `n_test` cases form the test set.
///
/// The first `max_lookback - 1` bars only feed indicator lookbacks, and the
/// final bar only serves as the last target.
pub fn split_train_test(n_prices: usize, max_lookback: usize, n_test: usize) -> Result<DataSplit> {
    if max_lookback == 0 {
        return Err(CdError::InvalidParameter(
            "max_lookback must be at least 1".to_string(),
        ));
    }

    let reserved = max_lookback + n_test;
    if n_prices <= reserved {
        return Err(CdError::InsufficientData(format!(
            "need more than {} prices, got {}",
            reserved, n_prices
        )));
    }

    let n_train = n_prices - reserved;
    let train_start = max_lookback - 1;
    Ok(DataSplit {
        train_start,
        n_train,
        test_start: train_start + n_train,
        n_test,
    })
}

/// Next-bar changes `prices[i+1] - prices[i]` for `n_cases` bars from `start_idx`.
pub fn compute_targets(prices: &[f64], start_idx: usize, n_cases: usize) -> Result<Vec<f64>> {
    let needed = start_idx + n_cases + 1;
    if prices.len() < needed {
        return Err(CdError::DataLength {
            what: "price history",
            expected: needed,
            got: prices.len(),
        });
    }

    Ok(prices[start_idx..needed]
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect())
}
