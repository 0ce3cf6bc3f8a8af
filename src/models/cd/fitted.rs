use serde::{Deserialize, Serialize};

use super::standardize::Scaling;

/// Coefficients of a finished fit together with everything needed to apply
/// them to raw predictors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub alpha: f64,
    pub lambda: f64,
    /// Standardized coefficients
    pub beta: Vec<f64>,
    pub scaling: Scaling,
    /// In-sample fraction of target variance explained
    pub explained: f64,
}

impl FittedModel {
    pub fn nvars(&self) -> usize {
        self.beta.len()
    }

    /// Predicted target in raw units for one raw predictor row.
    pub fn predict(&self, raw_row: &[f64]) -> f64 {
        let z = self.scaling.standardized_prediction(&self.beta, raw_row);
        self.scaling.unstandardize_y(z)
    }

    /// Raw-unit slopes and intercept equivalent to the standardized betas.
    pub fn raw_coefficients(&self) -> (Vec<f64>, f64) {
        let s = &self.scaling;
        let slopes: Vec<f64> = self
            .beta
            .iter()
            .zip(&s.xscales)
            .map(|(&b, &scale)| b * s.yscale / scale)
            .collect();
        let intercept = s.ymean
            - slopes
                .iter()
                .zip(&s.xmeans)
                .map(|(&slope, &mean)| slope * mean)
                .sum::<f64>();
        (slopes, intercept)
    }

    /// Number of nonzero coefficients.
    pub fn n_active(&self) -> usize {
        self.beta.iter().filter(|&&b| b != 0.0).count()
    }
}
