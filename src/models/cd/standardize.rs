use serde::{Deserialize, Serialize};

/// A column whose weighted variance falls below this fraction of its squared
/// mean is treated as constant.
const CONSTANT_TOLERANCE: f64 = 1.0e-24;

/// Affine transform between raw and standardized units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub xmeans: Vec<f64>,
    pub xscales: Vec<f64>,
    pub ymean: f64,
    pub yscale: f64,
}

impl Scaling {
    pub fn identity(nvars: usize) -> Self {
        Self {
            xmeans: vec![0.0; nvars],
            xscales: vec![1.0; nvars],
            ymean: 0.0,
            yscale: 1.0,
        }
    }

    pub fn nvars(&self) -> usize {
        self.xmeans.len()
    }

    pub fn standardize_x(&self, ivar: usize, raw: f64) -> f64 {
        (raw - self.xmeans[ivar]) / self.xscales[ivar]
    }

    pub fn standardize_y(&self, raw: f64) -> f64 {
        (raw - self.ymean) / self.yscale
    }

    pub fn unstandardize_y(&self, standardized: f64) -> f64 {
        standardized * self.yscale + self.ymean
    }

    /// Prediction in standardized target units for one raw predictor row.
    pub fn standardized_prediction(&self, coefs: &[f64], raw_row: &[f64]) -> f64 {
        coefs
            .iter()
            .zip(raw_row)
            .enumerate()
            .map(|(ivar, (&beta, &x))| beta * self.standardize_x(ivar, x))
            .sum()
    }
}

/// Weighted mean and standard deviation of `values`, with `weights` summing
/// to one. Constant columns get a scale of 1.0 and are flagged.
pub(crate) fn weighted_moments<I>(values: I, weights: &[f64]) -> Moments
where
    I: Iterator<Item = f64> + Clone,
{
    let mean: f64 = values.clone().zip(weights).map(|(v, &w)| w * v).sum();
    let var: f64 = values
        .zip(weights)
        .map(|(v, &w)| {
            let diff = v - mean;
            w * diff * diff
        })
        .sum();

    if var == 0.0 || var <= CONSTANT_TOLERANCE * mean * mean {
        Moments {
            mean,
            scale: 1.0,
            constant: true,
        }
    } else {
        Moments {
            mean,
            scale: var.sqrt(),
            constant: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Moments {
    pub mean: f64,
    pub scale: f64,
    pub constant: bool,
}

/// `sum_i w[i] * a[i] * b[i]`
pub(crate) fn weighted_dot(w: &[f64], a: &[f64], b: &[f64]) -> f64 {
    w.iter()
        .zip(a)
        .zip(b)
        .map(|((&wi, &ai), &bi)| wi * ai * bi)
        .sum()
}

/// Normalize non-negative weights to sum to one. Returns `None` when any
/// weight is negative or non-finite, or when they sum to zero.
pub(crate) fn normalize_weights(weights: &mut [f64]) -> Option<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    weights.iter_mut().for_each(|w| *w /= sum);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unweighted_moments() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let weights = [0.25; 4];
        let m = weighted_moments(values.iter().copied(), &weights);

        assert!((m.mean - 2.5).abs() < 1e-12);
        assert!((m.scale - 1.25_f64.sqrt()).abs() < 1e-12);
        assert!(!m.constant);
    }

    #[test]
    fn test_weighted_moments() {
        let values = [0.0, 10.0];
        let weights = [0.75, 0.25];
        let m = weighted_moments(values.iter().copied(), &weights);

        assert!((m.mean - 2.5).abs() < 1e-12);
        // 0.75 * 2.5^2 + 0.25 * 7.5^2
        assert!((m.scale - 18.75_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column() {
        let values = [0.1; 7];
        let weights = [1.0 / 7.0; 7];
        let m = weighted_moments(values.iter().copied(), &weights);

        assert!(m.constant);
        assert_eq!(m.scale, 1.0);
    }

    #[test]
    fn test_normalize_weights() {
        let mut w = vec![1.0, 3.0];
        assert!(normalize_weights(&mut w).is_some());
        assert_eq!(w, vec![0.25, 0.75]);

        assert!(normalize_weights(&mut [0.0, 0.0]).is_none());
        assert!(normalize_weights(&mut [1.0, -1.0]).is_none());
    }

    #[test]
    fn test_scaling_round_trip() {
        let scaling = Scaling {
            xmeans: vec![1.0, -2.0],
            xscales: vec![2.0, 0.5],
            ymean: 3.0,
            yscale: 4.0,
        };
        let z = scaling.standardized_prediction(&[0.5, 0.25], &[3.0, -1.0]);
        // 0.5 * 1.0 + 0.25 * 2.0
        assert!((z - 1.0).abs() < 1e-12);
        assert!((scaling.unstandardize_y(z) - 7.0).abs() < 1e-12);
        assert!((scaling.standardize_y(7.0) - 1.0).abs() < 1e-12);
    }
}
