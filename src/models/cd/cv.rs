use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CdError, Result};

use super::engine::{CoordinateDescent, DEFAULT_MIN_LAMBDA_RATIO};

/// How cases are assigned to cross-validation folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldScheme {
    /// Consecutive blocks, sizes differing by at most one case
    #[default]
    Contiguous,
    /// Case `i` goes to fold `i % nfolds`
    Interleaved,
}

impl std::str::FromStr for FoldScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contiguous" => Ok(FoldScheme::Contiguous),
            "interleaved" => Ok(FoldScheme::Interleaved),
            other => Err(format!("unknown fold scheme '{}'", other)),
        }
    }
}

/// Parameters of a cross-validated lambda search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub nfolds: usize,
    pub n_lambda: usize,
    pub alpha: f64,
    pub maxits: usize,
    pub eps: f64,
    pub fast_test: bool,
    pub covar_updates: bool,
    pub min_lambda_ratio: f64,
    pub fold_scheme: FoldScheme,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            nfolds: 10,
            n_lambda: 50,
            alpha: 0.5,
            maxits: 1000,
            eps: 1e-9,
            fast_test: true,
            covar_updates: true,
            min_lambda_ratio: DEFAULT_MIN_LAMBDA_RATIO,
            fold_scheme: FoldScheme::Contiguous,
        }
    }
}

/// Outcome of [`cv_train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    /// Lambda with the best pooled out-of-sample score
    pub lambda: f64,
    pub best_index: usize,
    /// Lambdas tried, largest first
    pub lambdas: Vec<f64>,
    /// Out-of-sample fraction of variance explained for each lambda
    pub lambda_oos: Vec<f64>,
}

impl CvResult {
    pub fn best_oos(&self) -> f64 {
        self.lambda_oos[self.best_index]
    }
}

/// Held-in and held-out cases of fold `ifold`.
///
/// Needs `1 <= nfolds <= n` and `ifold < nfolds`.
pub fn fold_cases(
    scheme: FoldScheme,
    n: usize,
    nfolds: usize,
    ifold: usize,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if nfolds == 0 || nfolds > n || ifold >= nfolds {
        return Err(CdError::InvalidParameter(format!(
            "fold {} of {} for {} cases",
            ifold, nfolds, n
        )));
    }

    let in_fold: Box<dyn Fn(usize) -> bool> = match scheme {
        FoldScheme::Contiguous => {
            // Fold f starts where the first f folds, each sized from what remains, end
            let mut start = 0;
            let mut size = 0;
            for f in 0..=ifold {
                start += size;
                size = (n - start) / (nfolds - f);
            }
            Box::new(move |k| k >= start && k < start + size)
        }
        FoldScheme::Interleaved => Box::new(move |k| k % nfolds == ifold),
    };

    Ok((0..n).partition(|&k| !in_fold(k)))
}

/// Index of the highest score; the earliest (largest lambda) wins ties.
pub fn best_lambda_index(lambda_oos: &[f64]) -> usize {
    let mut best_index = 0;
    for (ilambda, &score) in lambda_oos.iter().enumerate() {
        if score > lambda_oos[best_index] {
            best_index = ilambda;
        }
    }
    best_index
}

/// Choose lambda by k-fold cross validation.
///
/// `xx` is row-major `n x nvars` with `n = yy.len()`. Every fold fits the same
/// lambda grid, which starts at the full-sample threshold, so scores can be
/// pooled per lambda. Each score is the fraction of held-out target variance
/// explained, with squared errors and variances summed over all folds, so
/// larger folds count for more. The best lambda wins; ties go to the larger
/// lambda.
pub fn cv_train(
    nvars: usize,
    xx: &[f64],
    yy: &[f64],
    ww: Option<&[f64]>,
    config: &CvConfig,
) -> Result<CvResult> {
    let n = yy.len();
    let n_lambda = config.n_lambda;

    if n_lambda < 2 {
        return Err(CdError::InvalidParameter(format!(
            "cross validation needs at least 2 lambdas, got {}",
            n_lambda
        )));
    }
    if config.nfolds < 2 || config.nfolds > n {
        return Err(CdError::InvalidParameter(format!(
            "{} folds for {} cases",
            config.nfolds, n
        )));
    }
    if xx.len() != n * nvars {
        return Err(CdError::InvalidDimensions(format!(
            "predictor matrix has {} values for {} cases of {} variables",
            xx.len(),
            n,
            nvars
        )));
    }

    // The full sample fixes the top of the lambda grid
    let mut full = CoordinateDescent::new(nvars, n, ww.is_some(), false, 0)?;
    full.get_data(0, n, xx, yy, ww)?;
    let max_lambda = full.get_lambda_thresh(config.alpha)?;
    drop(full);
    if max_lambda <= 0.0 {
        return Err(CdError::InsufficientData(
            "no predictor is correlated with the target".to_string(),
        ));
    }

    info!(
        nfolds = config.nfolds,
        max_lambda = format_args!("{:.4}", max_lambda),
        "cv_train starting"
    );

    let mut lambdas = vec![0.0; n_lambda];
    let mut sse = vec![0.0; n_lambda];
    let mut yss = 0.0;

    for ifold in 0..config.nfolds {
        let (is_cases, oos_cases) = fold_cases(config.fold_scheme, n, config.nfolds, ifold)?;

        let mut cd = CoordinateDescent::new(
            nvars,
            is_cases.len(),
            ww.is_some(),
            config.covar_updates,
            n_lambda,
        )?
        .with_min_lambda_ratio(config.min_lambda_ratio)?;
        cd.get_data_subset(&is_cases, xx, yy, ww)?;
        cd.lambda_train(
            config.alpha,
            config.maxits,
            config.eps,
            config.fast_test,
            Some(max_lambda),
            false,
        )?;

        lambdas.copy_from_slice(cd.lambdas());
        let scaling = cd.scaling();

        for &k in &oos_cases {
            let weight = ww.map_or(1.0, |w| w[k]);
            let row = &xx[k * nvars..(k + 1) * nvars];
            let target = scaling.standardize_y(yy[k]);
            yss += weight * target * target;

            for (ilambda, err) in sse.iter_mut().enumerate() {
                let diff = target - scaling.standardized_prediction(cd.path_beta(ilambda), row);
                *err += weight * diff * diff;
            }
        }

        debug!(
            fold = ifold,
            n_is = is_cases.len(),
            n_oos = oos_cases.len(),
            "fold finished"
        );
    }

    let lambda_oos: Vec<f64> = sse
        .iter()
        .map(|&err| if yss > 0.0 { (yss - err) / yss } else { 0.0 })
        .collect();

    let best_index = best_lambda_index(&lambda_oos);

    info!(
        lambda = format_args!("{:.4}", lambdas[best_index]),
        explained = format_args!("{:.4}", lambda_oos[best_index]),
        "cv_train finished"
    );

    Ok(CvResult {
        lambda: lambdas[best_index],
        best_index,
        lambdas,
        lambda_oos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// One informative predictor (column 0) among pure noise.
    fn one_signal(nvars: usize, n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let xx: Vec<f64> = (0..nvars * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let yy: Vec<f64> = (0..n)
            .map(|i| xx[i * nvars] + 0.3 * rng.gen_range(-1.0..1.0))
            .collect();
        (xx, yy)
    }

    #[test]
    fn test_contiguous_folds_cover_all_cases() {
        let n = 23;
        let mut seen = vec![0; n];
        for ifold in 0..5 {
            let (is_cases, oos_cases) = fold_cases(FoldScheme::Contiguous, n, 5, ifold).unwrap();
            assert_eq!(is_cases.len() + oos_cases.len(), n);
            assert!(oos_cases.len() == 4 || oos_cases.len() == 5);
            assert!(oos_cases.windows(2).all(|p| p[1] == p[0] + 1));
            for k in oos_cases {
                seen[k] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_interleaved_folds() {
        let (is_cases, oos_cases) = fold_cases(FoldScheme::Interleaved, 10, 3, 1).unwrap();
        assert_eq!(oos_cases, vec![1, 4, 7]);
        assert_eq!(is_cases, vec![0, 2, 3, 5, 6, 8, 9]);
    }

    #[test]
    fn test_fold_cases_rejects_bad_arguments() {
        for scheme in [FoldScheme::Contiguous, FoldScheme::Interleaved] {
            assert!(fold_cases(scheme, 10, 0, 0).is_err());
            assert!(fold_cases(scheme, 10, 3, 3).is_err());
            assert!(fold_cases(scheme, 2, 3, 0).is_err());
            assert!(fold_cases(scheme, 10, 3, 2).is_ok());
        }
    }

    #[test]
    fn test_fold_scheme_parse() {
        assert_eq!("Interleaved".parse::<FoldScheme>().unwrap(), FoldScheme::Interleaved);
        assert!("random".parse::<FoldScheme>().is_err());
    }

    #[test]
    fn test_cv_keeps_informative_predictor() {
        let nvars = 10;
        let n = 300;
        let (xx, yy) = one_signal(nvars, n, 99);

        for scheme in [FoldScheme::Contiguous, FoldScheme::Interleaved] {
            let config = CvConfig {
                nfolds: 5,
                n_lambda: 30,
                fold_scheme: scheme,
                ..CvConfig::default()
            };
            let result = cv_train(nvars, &xx, &yy, None, &config).unwrap();

            assert_eq!(result.lambdas.len(), 30);
            assert_eq!(result.lambda, result.lambdas[result.best_index]);
            assert!(result.best_oos() > 0.8);
            // The top of the grid zeroes (almost) everything
            assert!(result.lambda_oos[0] < result.best_oos() - 0.5);

            let mut cd = CoordinateDescent::new(nvars, n, false, true, 0).unwrap();
            cd.get_data(0, n, &xx, &yy, None).unwrap();
            cd.core_train(config.alpha, result.lambda, 1000, 1e-9, true, false).unwrap();

            let informative = cd.beta()[0];
            let noise = cd.beta()[1..].iter().map(|b| b.abs()).fold(0.0, f64::max);
            assert!(informative > 0.8);
            assert!(noise < 0.1);
            assert!(informative > 10.0 * noise);
        }
    }

    #[test]
    fn test_cv_weighted() {
        let nvars = 6;
        let n = 200;
        let (xx, yy) = one_signal(nvars, n, 1);
        let ww: Vec<f64> = (0..n).map(|i| 1.0 + (i % 3) as f64).collect();

        let config = CvConfig {
            nfolds: 4,
            n_lambda: 20,
            covar_updates: false,
            ..CvConfig::default()
        };
        let result = cv_train(nvars, &xx, &yy, Some(&ww), &config).unwrap();
        assert!(result.best_oos() > 0.8);
        assert!(result.lambda_oos.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_ties_prefer_larger_lambda() {
        assert_eq!(best_lambda_index(&[0.1, 0.3, 0.3, 0.2]), 1);
        assert_eq!(best_lambda_index(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(best_lambda_index(&[-0.2, -0.1, 0.05]), 2);
    }

    #[test]
    fn test_cv_uncorrelated_target() {
        // A constant predictor leaves nothing to select
        let n = 40;
        let xx = vec![1.0; n];
        let yy: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let config = CvConfig {
            nfolds: 4,
            n_lambda: 5,
            ..CvConfig::default()
        };
        assert!(matches!(
            cv_train(1, &xx, &yy, None, &config),
            Err(CdError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_cv_rejects_bad_config() {
        let (xx, yy) = one_signal(3, 20, 2);
        let bad_folds = CvConfig {
            nfolds: 1,
            ..CvConfig::default()
        };
        assert!(cv_train(3, &xx, &yy, None, &bad_folds).is_err());

        let bad_lambdas = CvConfig {
            n_lambda: 1,
            ..CvConfig::default()
        };
        assert!(cv_train(3, &xx, &yy, None, &bad_lambdas).is_err());

        let bad_alpha = CvConfig {
            alpha: 0.0,
            nfolds: 4,
            ..CvConfig::default()
        };
        assert!(matches!(
            cv_train(3, &xx, &yy, None, &bad_alpha),
            Err(CdError::InvalidAlpha(_))
        ));
    }
}
