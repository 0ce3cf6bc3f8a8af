use serde::Serialize;

use crate::error::{CdError, Result};

/// Final numbers from a [`StocBias`] run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiasEstimate {
    /// Mean leave-one-out best in-sample total
    pub is_return: f64,
    /// Total over units of each slot's excluded-unit return
    pub oos_return: f64,
    pub bias: f64,
}

/// Jackknife estimate of the optimism from keeping the best of many
/// random trials evaluated on the same data.
///
/// A criterion routine writes one return per evaluation unit (usually a bar)
/// into [`returns_mut`](Self::returns_mut) and then calls
/// [`process`](Self::process). Slot `i` remembers the trial that would have
/// won had unit `i` been left out of the selection, along with what that
/// trial earned on unit `i`.
///
/// Only random or exhaustive trials are valid samples. Turn collection off
/// with [`collect`](Self::collect) during any guided refinement.
#[derive(Debug, Clone)]
pub struct StocBias {
    collecting: bool,
    seeded: bool,
    returns: Vec<f64>,
    is_best: Vec<f64>,
    oos: Vec<f64>,
}

impl StocBias {
    pub fn new(nreturns: usize) -> Result<Self> {
        if nreturns < 2 {
            return Err(CdError::InvalidParameter(format!(
                "bias estimation needs at least 2 returns, got {}",
                nreturns
            )));
        }

        Ok(Self {
            collecting: false,
            seeded: false,
            returns: vec![0.0; nreturns],
            is_best: vec![0.0; nreturns],
            oos: vec![0.0; nreturns],
        })
    }

    pub fn nreturns(&self) -> usize {
        self.returns.len()
    }

    pub fn collect(&mut self, collecting: bool) {
        self.collecting = collecting;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Scratch buffer for the current trial's per-unit returns.
    pub fn returns_mut(&mut self) -> &mut [f64] {
        &mut self.returns
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn is_best(&self) -> &[f64] {
        &self.is_best
    }

    pub fn oos(&self) -> &[f64] {
        &self.oos
    }

    /// Whether any trial has been counted yet.
    pub fn has_trials(&self) -> bool {
        self.seeded
    }

    /// Fold the current returns buffer into the accumulators.
    pub fn process(&mut self) {
        if !self.collecting {
            return;
        }

        let total: f64 = self.returns.iter().sum();
        let seeding = !self.seeded;
        for ((&unit, best), oos) in self
            .returns
            .iter()
            .zip(self.is_best.iter_mut())
            .zip(self.oos.iter_mut())
        {
            let left_out = total - unit;
            if seeding || left_out > *best {
                *best = left_out;
                *oos = unit;
            }
        }
        self.seeded = true;
    }

    /// Each `is_best` entry sums `nreturns - 1` units, so their total is
    /// rescaled by `nreturns - 1` to be comparable with the OOS total.
    pub fn compute(&self) -> BiasEstimate {
        let n = self.returns.len();
        let is_return = self.is_best.iter().sum::<f64>() / (n - 1) as f64;
        let oos_return: f64 = self.oos.iter().sum();
        BiasEstimate {
            is_return,
            oos_return,
            bias: is_return - oos_return,
        }
    }

    pub fn reset(&mut self) {
        self.returns.fill(0.0);
        self.is_best.fill(0.0);
        self.oos.fill(0.0);
        self.seeded = false;
        self.collecting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_trial(sb: &mut StocBias, returns: &[f64]) {
        sb.returns_mut().copy_from_slice(returns);
        sb.process();
    }

    #[test]
    fn test_needs_two_returns() {
        assert!(StocBias::new(0).is_err());
        assert!(StocBias::new(1).is_err());
        let sb = StocBias::new(2).unwrap();
        assert_eq!(sb.nreturns(), 2);
        assert!(!sb.is_collecting());
        assert!(!sb.has_trials());
    }

    #[test]
    fn test_not_collecting_is_noop() {
        let mut sb = StocBias::new(3).unwrap();
        sb.collect(true);
        run_trial(&mut sb, &[1.0, 2.0, 3.0]);
        let before = (sb.is_best().to_vec(), sb.oos().to_vec());

        sb.collect(false);
        run_trial(&mut sb, &[10.0, 10.0, 10.0]);

        assert_eq!(sb.is_best(), before.0.as_slice());
        assert_eq!(sb.oos(), before.1.as_slice());
    }

    #[test]
    fn test_first_trial_seeds_every_slot() {
        let mut sb = StocBias::new(3).unwrap();
        sb.collect(true);
        // A losing first trial must still seed, even below the zero fill.
        run_trial(&mut sb, &[-1.0, -2.0, -3.0]);

        assert!(sb.has_trials());
        assert_eq!(sb.is_best(), &[-5.0, -4.0, -3.0]);
        assert_eq!(sb.oos(), &[-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_slots_track_best_left_out_total() {
        let mut sb = StocBias::new(3).unwrap();
        sb.collect(true);
        run_trial(&mut sb, &[1.0, 2.0, 3.0]);
        run_trial(&mut sb, &[2.0, 2.0, 3.0]);

        // Totals 6 then 7. Slot 0 ties at 5 and keeps the first trial.
        assert_eq!(sb.is_best(), &[5.0, 5.0, 4.0]);
        assert_eq!(sb.oos(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_each_exclusion_eventually_wins() {
        let mut sb = StocBias::new(5).unwrap();
        sb.collect(true);
        for k in 0..5 {
            let mut returns = [1.0; 5];
            returns[k] = 0.0;
            run_trial(&mut sb, &returns);
        }

        // Slot k is won by the trial that scored 0 on unit k.
        assert_eq!(sb.is_best(), &[4.0; 5]);
        assert_eq!(sb.oos(), &[0.0; 5]);

        let est = sb.compute();
        assert_eq!(est.is_return, 5.0);
        assert_eq!(est.oos_return, 0.0);
        assert_eq!(est.bias, 5.0);
    }

    #[test]
    fn test_single_trial_has_no_bias() {
        let mut sb = StocBias::new(4).unwrap();
        sb.collect(true);
        run_trial(&mut sb, &[0.5, -0.25, 1.0, 0.75]);

        let est = sb.compute();
        assert!((est.is_return - 2.0).abs() < 1e-12);
        assert!((est.oos_return - 2.0).abs() < 1e-12);
        assert!(est.bias.abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut sb = StocBias::new(3).unwrap();
        sb.collect(true);
        run_trial(&mut sb, &[1.0, 2.0, 3.0]);
        sb.reset();

        assert!(!sb.is_collecting());
        assert!(!sb.has_trials());
        assert_eq!(sb.is_best(), &[0.0; 3]);
        assert_eq!(sb.returns(), &[0.0; 3]);
    }
}
