use anyhow::Result;
use cdnet::estimators::{BiasEstimate, StocBias};
use cdnet::indicators::{ma_crossover, MaSpec};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// A long/short moving-average crossover trading system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaSystem {
    pub long_lookback: usize,
    /// Short lookback as a percentage of the long one
    pub short_pct: f64,
}

impl MaSystem {
    pub fn short_lookback(&self) -> usize {
        let short = (self.short_pct * self.long_lookback as f64 / 100.0) as usize;
        short.clamp(1, self.long_lookback.saturating_sub(1).max(1))
    }

    fn spec(&self) -> MaSpec {
        MaSpec {
            short_lookback: self.short_lookback(),
            long_lookback: self.long_lookback,
        }
    }

    /// Per-bar log returns of the system from bar `max_lookback - 1` on.
    ///
    /// The position for the change to bar `i + 1` is long when the short mean
    /// through bar `i` is above the long mean, short when below. Returns the
    /// total.
    pub fn bar_returns(&self, prices: &[f64], max_lookback: usize, returns: &mut [f64]) -> f64 {
        let spec = self.spec();
        let first = max_lookback - 1;
        let mut total = 0.0;
        for (slot, i) in returns.iter_mut().zip(first..prices.len().saturating_sub(1)) {
            let signal = ma_crossover(&prices[..=i], spec);
            let change = prices[i + 1] - prices[i];
            *slot = if signal > 0.0 {
                change
            } else if signal < 0.0 {
                -change
            } else {
                0.0
            };
            total += *slot;
        }
        total
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Longest long lookback tried; also fixes the first traded bar
    pub max_lookback: usize,
    /// Random trials, all counted by the bias estimator
    pub n_random: usize,
    /// Greedy refinement steps, never counted
    pub n_refine: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub best: MaSystem,
    pub best_return: f64,
    /// Best total before refinement
    pub random_best_return: f64,
    pub trials: usize,
    pub estimate: BiasEstimate,
}

/// Number of bar returns a search over `n_prices` prices produces.
pub fn n_bar_returns(n_prices: usize, max_lookback: usize) -> usize {
    n_prices.saturating_sub(max_lookback)
}

/// Random search over crossover systems followed by greedy refinement.
///
/// Every random trial's bar returns feed `bias`; the refinement phase
/// evaluates through the same buffer with collection switched off.
pub fn run_search<R: Rng>(
    prices: &[f64],
    config: &SearchConfig,
    bias: &mut StocBias,
    rng: &mut R,
) -> Result<SearchOutcome> {
    if config.max_lookback < 2 {
        anyhow::bail!("max_lookback must be at least 2");
    }
    if config.n_random == 0 {
        anyhow::bail!("at least one random trial is needed");
    }
    let nreturns = n_bar_returns(prices.len(), config.max_lookback);
    if nreturns != bias.nreturns() {
        anyhow::bail!(
            "bias estimator holds {} returns but the search produces {}",
            bias.nreturns(),
            nreturns
        );
    }

    let evaluate = |system: MaSystem, bias: &mut StocBias| {
        let total = system.bar_returns(prices, config.max_lookback, bias.returns_mut());
        bias.process();
        total
    };

    bias.collect(true);
    let mut best: Option<(MaSystem, f64)> = None;
    for _ in 0..config.n_random {
        let system = MaSystem {
            long_lookback: rng.gen_range(2..=config.max_lookback),
            short_pct: rng.gen_range(1.0..99.0),
        };
        let total = evaluate(system, &mut *bias);
        if best.map_or(true, |(_, b)| total > b) {
            best = Some((system, total));
        }
    }
    bias.collect(false);

    let (mut best, mut best_return) = match best {
        Some(found) => found,
        None => anyhow::bail!("random search produced no trials"),
    };
    let random_best_return = best_return;
    info!(
        long = best.long_lookback,
        short = best.short_lookback(),
        total = format_args!("{:.5}", best_return),
        "best random trial"
    );

    // Coordinate steps shrink whenever no neighbour improves
    let mut long_step = (config.max_lookback / 4).max(1);
    let mut pct_step = 10.0;
    for _ in 0..config.n_refine {
        let mut improved = false;
        let candidates = [
            MaSystem { long_lookback: best.long_lookback + long_step, ..best },
            MaSystem { long_lookback: best.long_lookback.saturating_sub(long_step), ..best },
            MaSystem { short_pct: best.short_pct + pct_step, ..best },
            MaSystem { short_pct: best.short_pct - pct_step, ..best },
        ];
        for candidate in candidates {
            if candidate.long_lookback < 2
                || candidate.long_lookback > config.max_lookback
                || !(1.0..99.0).contains(&candidate.short_pct)
            {
                continue;
            }
            let total = evaluate(candidate, &mut *bias);
            if total > best_return {
                best = candidate;
                best_return = total;
                improved = true;
            }
        }
        if !improved {
            if long_step == 1 && pct_step < 0.5 {
                break;
            }
            long_step = (long_step / 2).max(1);
            pct_step *= 0.5;
        }
    }
    debug!(
        long = best.long_lookback,
        short_pct = format_args!("{:.2}", best.short_pct),
        "refined system"
    );

    Ok(SearchOutcome {
        best,
        best_return,
        random_best_return,
        trials: config.n_random,
        estimate: bias.compute(),
    })
}
