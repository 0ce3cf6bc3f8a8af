use tracing::trace;

use crate::error::{CdError, Result};

use super::engine::CoordinateDescent;
use super::standardize::weighted_dot;

/// How a call to [`CoordinateDescent::core_train`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainOutcome {
    /// Full or active-set sweeps performed
    pub iterations: usize,
    /// False when `maxits` stopped the descent first
    pub converged: bool,
}

/// `sign(z) * max(|z| - t, 0)`
pub fn soft_threshold(z: f64, t: f64) -> f64 {
    if z > t {
        z - t
    } else if z < -t {
        z + t
    } else {
        0.0
    }
}

impl CoordinateDescent {
    /// Fit one (alpha, lambda) pair by cyclic coordinate descent.
    ///
    /// Minimizes `0.5 * sum_i w_i r_i^2 + lambda * sum_j (0.5 * (1 - alpha) * b_j^2 + alpha * |b_j|)`
    /// on the standardized data. With `warm_start` the current betas are the
    /// starting point, otherwise descent starts from zero.
    ///
    /// Sweeps alternate between all variables and the active (nonzero) set;
    /// descent stops once a full sweep converges without changing the active
    /// set. `fast_test` judges convergence by the largest coefficient change,
    /// otherwise by the decrease in the objective. Hitting `maxits` is not an
    /// error: the betas reached so far are kept and `converged` is false.
    pub fn core_train(
        &mut self,
        alpha: f64,
        lambda: f64,
        maxits: usize,
        eps: f64,
        fast_test: bool,
        warm_start: bool,
    ) -> Result<TrainOutcome> {
        if !self.loaded {
            return Err(CdError::NoData);
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(CdError::InvalidAlpha(alpha));
        }
        if !(lambda >= 0.0) {
            return Err(CdError::InvalidParameter(format!(
                "lambda must be non-negative, got {}",
                lambda
            )));
        }

        let s_threshold = alpha * lambda;
        let ridge = lambda * (1.0 - alpha);

        if warm_start {
            self.refresh_from_beta();
        } else {
            self.beta.fill(0.0);
            self.resid.copy_from_slice(&self.y);
            if let Some(cache) = self.cache.as_mut() {
                cache.grad.copy_from_slice(&cache.yinner);
            }
        }

        let mut do_active_only = false;
        let mut prior_crit = f64::MAX;
        let mut outcome = TrainOutcome {
            iterations: 0,
            converged: false,
        };

        for iter in 0..maxits {
            outcome.iterations = iter + 1;
            let mut active_set_changed = false;
            let mut max_change: f64 = 0.0;

            for ivar in 0..self.nvars {
                if do_active_only && self.beta[ivar] == 0.0 {
                    continue;
                }

                let xss = self.xssvec[ivar];
                if xss <= 0.0 {
                    // Inert column; its beta stays at zero
                    continue;
                }

                let old_beta = self.beta[ivar];
                let argument = self.partial_correlation(ivar) + xss * old_beta;
                let new_beta = soft_threshold(argument, s_threshold) / (xss + ridge);

                let correction = new_beta - old_beta;
                if correction == 0.0 {
                    continue;
                }
                max_change = max_change.max(correction.abs());
                if (old_beta == 0.0) != (new_beta == 0.0) {
                    active_set_changed = true;
                }
                self.beta[ivar] = new_beta;
                self.propagate(ivar, correction);
            }

            let converged = if fast_test {
                max_change < eps
            } else {
                // y is standardized, so this decrease is relative to its total variance
                let crit = self.objective(alpha, lambda);
                let done = prior_crit - crit < eps;
                prior_crit = crit;
                done
            };

            if do_active_only {
                if converged {
                    do_active_only = false;
                }
            } else {
                if converged && !active_set_changed {
                    outcome.converged = true;
                    break;
                }
                do_active_only = true;
            }
        }

        if self.cache.is_some() {
            self.rebuild_residual();
        }
        let sse = weighted_dot(&self.w, &self.resid, &self.resid);
        self.explained = if self.yss > 0.0 {
            (self.yss - sse) / self.yss
        } else {
            0.0
        };

        trace!(
            alpha,
            lambda,
            iterations = outcome.iterations,
            converged = outcome.converged,
            explained = self.explained,
            "core_train finished"
        );
        Ok(outcome)
    }

    /// Smallest lambda at which every beta is zero for this alpha.
    ///
    /// Meaningless for a pure ridge penalty, so alpha must be positive;
    /// callers wanting alpha <= 0 should fit with lambda = 0 instead.
    pub fn get_lambda_thresh(&self, alpha: f64) -> Result<f64> {
        if !self.loaded {
            return Err(CdError::NoData);
        }
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(CdError::InvalidAlpha(alpha));
        }

        let max_corr = (0..self.nvars)
            .map(|ivar| match self.cache.as_ref() {
                Some(cache) => cache.yinner[ivar].abs(),
                None => weighted_dot(&self.w, self.column(ivar), &self.y).abs(),
            })
            .fold(0.0, f64::max);

        // Make sure alpha * thresh does not round below the correlation
        let mut thresh = max_corr / alpha;
        while alpha * thresh < max_corr {
            thresh += thresh * f64::EPSILON;
        }
        Ok(thresh)
    }

    /// Weighted inner product of column `ivar` with the current residual.
    fn partial_correlation(&self, ivar: usize) -> f64 {
        match self.cache.as_ref() {
            Some(cache) => cache.grad[ivar],
            None => weighted_dot(&self.w, self.column(ivar), &self.resid),
        }
    }

    /// Apply a change in beta `ivar` to the residual or the cached gradient.
    fn propagate(&mut self, ivar: usize, correction: f64) {
        let nvars = self.nvars;
        let ncases = self.ncases;
        match self.cache.as_mut() {
            Some(cache) => {
                let row = &cache.xinner[ivar * nvars..(ivar + 1) * nvars];
                for (g, &xx) in cache.grad.iter_mut().zip(row) {
                    *g -= correction * xx;
                }
            }
            None => {
                let col = &self.x[ivar * ncases..(ivar + 1) * ncases];
                for (r, &x) in self.resid.iter_mut().zip(col) {
                    *r -= correction * x;
                }
            }
        }
    }

    /// Penalized criterion scaled by two, the quantity convergence watches.
    fn objective(&self, alpha: f64, lambda: f64) -> f64 {
        let sse = match self.cache.as_ref() {
            Some(cache) => {
                let explained: f64 = self
                    .beta
                    .iter()
                    .zip(cache.yinner.iter().zip(&cache.grad))
                    .map(|(&b, (&yi, &g))| b * (yi + g))
                    .sum();
                self.yss - explained
            }
            None => weighted_dot(&self.w, &self.resid, &self.resid),
        };

        let penalty: f64 = self
            .beta
            .iter()
            .map(|&b| 0.5 * (1.0 - alpha) * b * b + alpha * b.abs())
            .sum();
        sse + 2.0 * lambda * penalty
    }

    /// Recompute the residual or gradient from the current betas.
    fn refresh_from_beta(&mut self) {
        if self.cache.is_none() {
            self.rebuild_residual();
            return;
        }
        let nvars = self.nvars;
        if let Some(cache) = self.cache.as_mut() {
            for (ivar, g) in cache.grad.iter_mut().enumerate() {
                let row = &cache.xinner[ivar * nvars..(ivar + 1) * nvars];
                let fitted: f64 = row.iter().zip(&self.beta).map(|(&xx, &b)| xx * b).sum();
                *g = cache.yinner[ivar] - fitted;
            }
        }
    }

    fn rebuild_residual(&mut self) {
        self.resid.copy_from_slice(&self.y);
        for ivar in 0..self.nvars {
            let b = self.beta[ivar];
            if b == 0.0 {
                continue;
            }
            let col = &self.x[ivar * self.ncases..(ivar + 1) * self.ncases];
            for (r, &x) in self.resid.iter_mut().zip(col) {
                *r -= b * x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn synthetic(nvars: usize, ncases: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let xx: Vec<f64> = (0..nvars * ncases).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let yy: Vec<f64> = (0..ncases)
            .map(|i| {
                let row = &xx[i * nvars..(i + 1) * nvars];
                row[0] - 0.5 * row[1] + 0.25 * row[2] + 0.3 * rng.gen_range(-1.0..1.0)
            })
            .collect();
        (xx, yy)
    }

    fn loaded(nvars: usize, ncases: usize, covar: bool, seed: u64) -> CoordinateDescent {
        let (xx, yy) = synthetic(nvars, ncases, seed);
        let mut cd = CoordinateDescent::new(nvars, ncases, false, covar, 0).unwrap();
        cd.get_data(0, ncases, &xx, &yy, None).unwrap();
        cd
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
    }

    #[test]
    fn test_ols_recovers_exact_coefficients() {
        let nvars = 3;
        let ncases = 200;
        let mut rng = StdRng::seed_from_u64(7);
        let mut xx = Vec::with_capacity(nvars * ncases);
        let mut yy = Vec::with_capacity(ncases);
        for _ in 0..ncases {
            let x1 = rng.gen_range(0.0..10.0);
            let x2 = rng.gen_range(-5.0..5.0);
            let x3 = rng.gen_range(100.0..101.0);
            xx.extend_from_slice(&[x1, x2, x3]);
            yy.push(2.0 + 1.5 * x1 - 0.7 * x2 + 0.3 * x3);
        }

        for covar in [false, true] {
            let mut cd = CoordinateDescent::new(nvars, ncases, false, covar, 0).unwrap();
            cd.get_data(0, ncases, &xx, &yy, None).unwrap();
            let outcome = cd.core_train(0.5, 0.0, 10_000, 1e-14, true, false).unwrap();
            assert!(outcome.converged);

            let model = cd.fitted(0.5, 0.0);
            let (slopes, intercept) = model.raw_coefficients();
            assert!((slopes[0] - 1.5).abs() < 1e-6);
            assert!((slopes[1] + 0.7).abs() < 1e-6);
            assert!((slopes[2] - 0.3).abs() < 1e-6);
            assert!((intercept - 2.0).abs() < 1e-4);
            assert!((cd.explained() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_weighted_ols_matches_normal_equations() {
        let ncases = 150;
        let mut rng = StdRng::seed_from_u64(11);
        let mut xx = Vec::with_capacity(2 * ncases);
        let mut yy = Vec::with_capacity(ncases);
        let mut ww = Vec::with_capacity(ncases);
        for _ in 0..ncases {
            let x1: f64 = rng.gen_range(-2.0..2.0);
            let x2: f64 = rng.gen_range(0.0..3.0) + 0.3 * x1;
            xx.extend_from_slice(&[x1, x2]);
            yy.push(1.0 + 0.8 * x1 - 1.2 * x2 + rng.gen_range(-1.0..1.0));
            ww.push(rng.gen_range(0.1..2.0));
        }

        // Weighted least squares on centered data, solved directly
        let wsum: f64 = ww.iter().sum();
        let mean = |f: &dyn Fn(usize) -> f64| (0..ncases).map(|i| ww[i] * f(i)).sum::<f64>() / wsum;
        let m1 = mean(&|i| xx[2 * i]);
        let m2 = mean(&|i| xx[2 * i + 1]);
        let my = mean(&|i| yy[i]);
        let (mut s11, mut s12, mut s22, mut s1y, mut s2y) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for i in 0..ncases {
            let (a, b, c) = (xx[2 * i] - m1, xx[2 * i + 1] - m2, yy[i] - my);
            s11 += ww[i] * a * a;
            s12 += ww[i] * a * b;
            s22 += ww[i] * b * b;
            s1y += ww[i] * a * c;
            s2y += ww[i] * b * c;
        }
        let det = s11 * s22 - s12 * s12;
        let b1 = (s22 * s1y - s12 * s2y) / det;
        let b2 = (s11 * s2y - s12 * s1y) / det;

        for covar in [false, true] {
            let mut cd = CoordinateDescent::new(2, ncases, true, covar, 0).unwrap();
            cd.get_data(0, ncases, &xx, &yy, Some(&ww)).unwrap();
            cd.core_train(1.0, 0.0, 10_000, 1e-14, true, false).unwrap();

            let (slopes, intercept) = cd.fitted(1.0, 0.0).raw_coefficients();
            assert!((slopes[0] - b1).abs() < 1e-6);
            assert!((slopes[1] - b2).abs() < 1e-6);
            assert!((intercept - (my - b1 * m1 - b2 * m2)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lambda_thresh_zeroes_all_betas() {
        for covar in [false, true] {
            let mut cd = loaded(8, 120, covar, 3);
            for alpha in [0.25, 0.5, 1.0] {
                let thresh = cd.get_lambda_thresh(alpha).unwrap();
                cd.core_train(alpha, thresh, 1000, 1e-9, true, false).unwrap();
                assert!(cd.beta().iter().all(|&b| b == 0.0));

                cd.core_train(alpha, 2.0 * thresh, 1000, 1e-9, true, false).unwrap();
                assert!(cd.beta().iter().all(|&b| b == 0.0));
                assert_eq!(cd.explained(), 0.0);

                cd.core_train(alpha, 0.9 * thresh, 1000, 1e-9, true, false).unwrap();
                assert!(cd.beta().iter().any(|&b| b != 0.0));
            }
        }
    }

    #[test]
    fn test_lambda_thresh_needs_positive_alpha() {
        let cd = loaded(3, 30, false, 5);
        assert!(matches!(cd.get_lambda_thresh(0.0), Err(CdError::InvalidAlpha(_))));
        assert!(matches!(cd.get_lambda_thresh(-0.5), Err(CdError::InvalidAlpha(_))));
    }

    #[test]
    fn test_covariance_and_direct_agree() {
        let mut direct = loaded(10, 80, false, 21);
        let mut covar = loaded(10, 80, true, 21);
        let lambda = 0.2 * direct.get_lambda_thresh(0.7).unwrap();

        for fast_test in [true, false] {
            direct.core_train(0.7, lambda, 10_000, 1e-13, fast_test, false).unwrap();
            covar.core_train(0.7, lambda, 10_000, 1e-13, fast_test, false).unwrap();

            for (a, b) in direct.beta().iter().zip(covar.beta()) {
                assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
            }
            assert!((direct.explained() - covar.explained()).abs() < 1e-6);
            for (a, b) in direct.residual().iter().zip(covar.residual()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_residual_consistent_with_beta() {
        let mut cd = loaded(6, 60, false, 9);
        let lambda = 0.1 * cd.get_lambda_thresh(1.0).unwrap();
        cd.core_train(1.0, lambda, 1000, 1e-10, true, false).unwrap();

        for icase in 0..60 {
            let fit: f64 = (0..6).map(|j| cd.beta()[j] * cd.column(j)[icase]).sum();
            assert!((cd.target()[icase] - fit - cd.residual()[icase]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_warm_start_matches_cold_start() {
        let mut cd = loaded(6, 100, true, 17);
        let thresh = cd.get_lambda_thresh(0.5).unwrap();

        cd.core_train(0.5, 0.05 * thresh, 10_000, 1e-13, true, false).unwrap();
        let cold = cd.beta().to_vec();

        cd.core_train(0.5, 0.5 * thresh, 10_000, 1e-13, true, false).unwrap();
        let outcome = cd.core_train(0.5, 0.05 * thresh, 10_000, 1e-13, true, true).unwrap();
        assert!(outcome.converged);
        for (a, b) in cd.beta().iter().zip(&cold) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_maxits_is_soft_stop() {
        let mut cd = loaded(10, 50, false, 2);
        let outcome = cd.core_train(0.5, 0.0, 1, 1e-15, true, false).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.converged);
        assert!(cd.explained() > 0.0);
    }

    #[test]
    fn test_requires_data() {
        let mut cd = CoordinateDescent::new(2, 5, false, false, 0).unwrap();
        assert!(matches!(
            cd.core_train(0.5, 0.1, 10, 1e-6, true, false),
            Err(CdError::NoData)
        ));
        assert!(matches!(cd.get_lambda_thresh(0.5), Err(CdError::NoData)));
    }

    #[test]
    fn test_inert_column_stays_zero() {
        let ncases = 40;
        let (mut xx, yy) = synthetic(3, ncases, 4);
        for icase in 0..ncases {
            xx[icase * 3 + 2] = 7.0;
        }
        let mut cd = CoordinateDescent::new(3, ncases, false, true, 0).unwrap();
        cd.get_data(0, ncases, &xx, &yy, None).unwrap();
        cd.core_train(0.5, 0.0, 1000, 1e-12, true, false).unwrap();

        assert_eq!(cd.beta()[2], 0.0);
        assert!(cd.beta()[0].is_finite() && cd.beta()[0] != 0.0);
    }
}
