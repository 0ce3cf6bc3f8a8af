use tracing::{debug, info};

use crate::error::{CdError, Result};

use super::engine::CoordinateDescent;

/// Fraction of the threshold used as the top of a path when the caller
/// supplies none, so the first fit already has a variable entering.
const THRESH_FRACTION: f64 = 0.999;

impl CoordinateDescent {
    /// Fit a descending geometric sequence of `n_lambda` lambdas.
    ///
    /// The path starts at `max_lambda`, which must be positive, or just below
    /// the threshold lambda when none is given. It ends at
    /// `min_lambda_ratio * max_lambda`. Each fit is warm-started from the
    /// previous one and its betas are saved.
    pub fn lambda_train(
        &mut self,
        alpha: f64,
        maxits: usize,
        eps: f64,
        fast_test: bool,
        max_lambda: Option<f64>,
        print_steps: bool,
    ) -> Result<()> {
        if self.n_lambda < 2 {
            return Err(CdError::InvalidParameter(format!(
                "lambda path needs at least 2 lambdas, engine reserved {}",
                self.n_lambda
            )));
        }

        let max_lambda = match max_lambda {
            Some(lambda) if lambda > 0.0 => lambda,
            Some(lambda) => {
                return Err(CdError::InvalidParameter(format!(
                    "max_lambda must be positive, got {}",
                    lambda
                )));
            }
            None => THRESH_FRACTION * self.get_lambda_thresh(alpha)?,
        };
        if !(max_lambda > 0.0) {
            return Err(CdError::InsufficientData(
                "no predictor is correlated with the target".to_string(),
            ));
        }
        let min_lambda = self.min_lambda_ratio * max_lambda;
        let lambda_factor = ((min_lambda / max_lambda).ln() / (self.n_lambda - 1) as f64).exp();

        debug!(
            alpha,
            max_lambda,
            min_lambda,
            n_lambda = self.n_lambda,
            "descending lambda training"
        );

        let nvars = self.nvars;
        let mut lambda = max_lambda;
        for ilambda in 0..self.n_lambda {
            self.lambdas[ilambda] = lambda;
            let outcome = self.core_train(alpha, lambda, maxits, eps, fast_test, ilambda > 0)?;
            self.lambda_beta[ilambda * nvars..(ilambda + 1) * nvars].copy_from_slice(&self.beta);

            if print_steps {
                info!(
                    lambda = format_args!("{:.4}", lambda),
                    n_active = self.n_active(),
                    explained = format_args!("{:.4}", self.explained),
                    iterations = outcome.iterations,
                    "path step"
                );
            }

            lambda *= lambda_factor;
        }

        Ok(())
    }

    /// Lambdas of the last path, largest first.
    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    /// Betas saved for path step `ilambda`.
    pub fn path_beta(&self, ilambda: usize) -> &[f64] {
        &self.lambda_beta[ilambda * self.nvars..(ilambda + 1) * self.nvars]
    }

    pub fn n_lambda(&self) -> usize {
        self.n_lambda
    }

    /// Number of nonzero coefficients in the current betas.
    pub fn n_active(&self) -> usize {
        self.beta.iter().filter(|&&b| b != 0.0).count()
    }
}
