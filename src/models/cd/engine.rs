use crate::error::{CdError, Result};

use super::fitted::FittedModel;
use super::standardize::{normalize_weights, weighted_dot, weighted_moments, Scaling};

/// Default smallest lambda on a path, as a fraction of the largest.
pub const DEFAULT_MIN_LAMBDA_RATIO: f64 = 0.001;

/// Elastic-net regression by coordinate descent.
///
/// All storage is sized at construction from `(nvars, ncases, n_lambda)`;
/// loading data and training reuse it. Predictors are kept column-major in
/// standardized form.
#[derive(Debug, Clone)]
pub struct CoordinateDescent {
    pub(super) nvars: usize,
    pub(super) ncases: usize,
    pub(super) weighted: bool,
    pub(super) n_lambda: usize,
    pub(super) min_lambda_ratio: f64,
    pub(super) loaded: bool,

    /// Standardized predictors, column `j` at `x[j*ncases..(j+1)*ncases]`
    pub(super) x: Vec<f64>,
    pub(super) y: Vec<f64>,
    /// Case weights summing to one (uniform when unweighted)
    pub(super) w: Vec<f64>,
    /// Weighted sum of squares of `y`; 1 unless the target is constant
    pub(super) yss: f64,
    /// Weighted sum of squares of each column; 1, or 0 for an inert column
    pub(super) xssvec: Vec<f64>,
    pub(super) scaling: Scaling,
    pub(super) cache: Option<CovarCache>,

    pub(super) beta: Vec<f64>,
    pub(super) resid: Vec<f64>,
    pub(super) explained: f64,

    pub(super) lambdas: Vec<f64>,
    /// Saved betas, one row of `nvars` per lambda
    pub(super) lambda_beta: Vec<f64>,
}

/// Inner products for covariance updates.
#[derive(Debug, Clone)]
pub(super) struct CovarCache {
    /// Weighted X'X, row-major nvars x nvars
    pub xinner: Vec<f64>,
    /// Weighted X'Y
    pub yinner: Vec<f64>,
    /// Weighted X'r for the current residual, kept in step with beta
    pub grad: Vec<f64>,
}

fn alloc(len: usize) -> Result<Vec<f64>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| CdError::Allocation { len })?;
    v.resize(len, 0.0);
    Ok(v)
}

fn product(a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b)
        .ok_or(CdError::Allocation { len: usize::MAX })
}

impl CoordinateDescent {
    /// Allocate an engine.
    ///
    /// `n_lambda` reserves room for that many saved beta sets from
    /// [`lambda_train`](Self::lambda_train); it may be zero for single fits.
    pub fn new(
        nvars: usize,
        ncases: usize,
        weighted: bool,
        covar_updates: bool,
        n_lambda: usize,
    ) -> Result<Self> {
        if nvars == 0 || ncases == 0 {
            return Err(CdError::InvalidDimensions(format!(
                "nvars={} ncases={}",
                nvars, ncases
            )));
        }

        let cache = if covar_updates {
            Some(CovarCache {
                xinner: alloc(product(nvars, nvars)?)?,
                yinner: alloc(nvars)?,
                grad: alloc(nvars)?,
            })
        } else {
            None
        };

        Ok(Self {
            nvars,
            ncases,
            weighted,
            n_lambda,
            min_lambda_ratio: DEFAULT_MIN_LAMBDA_RATIO,
            loaded: false,
            x: alloc(product(nvars, ncases)?)?,
            y: alloc(ncases)?,
            w: alloc(ncases)?,
            yss: 0.0,
            xssvec: alloc(nvars)?,
            scaling: Scaling::identity(nvars),
            cache,
            beta: alloc(nvars)?,
            resid: alloc(ncases)?,
            explained: 0.0,
            lambdas: alloc(n_lambda)?,
            lambda_beta: alloc(product(n_lambda, nvars)?)?,
        })
    }

    /// Set the smallest path lambda as a fraction of the largest.
    pub fn with_min_lambda_ratio(mut self, ratio: f64) -> Result<Self> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(CdError::InvalidParameter(format!(
                "min_lambda_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        self.min_lambda_ratio = ratio;
        Ok(self)
    }

    /// Load and standardize `ncases` consecutive cases starting at `istart`,
    /// wrapping around the `n` available cases.
    ///
    /// `xx` is row-major `n x nvars`. Weights are required exactly when the
    /// engine was built as weighted.
    pub fn get_data(
        &mut self,
        istart: usize,
        n: usize,
        xx: &[f64],
        yy: &[f64],
        ww: Option<&[f64]>,
    ) -> Result<()> {
        if n < self.ncases || istart >= n {
            return Err(CdError::InvalidParameter(format!(
                "window of {} cases from {} in {} available",
                self.ncases, istart, n
            )));
        }
        self.load(|icase| (icase + istart) % n, n, xx, yy, ww)
    }

    /// Load and standardize the listed cases, in order.
    pub fn get_data_subset(
        &mut self,
        cases: &[usize],
        xx: &[f64],
        yy: &[f64],
        ww: Option<&[f64]>,
    ) -> Result<()> {
        if cases.len() != self.ncases {
            return Err(CdError::InvalidDimensions(format!(
                "{} cases listed for an engine of {}",
                cases.len(),
                self.ncases
            )));
        }
        let n = yy.len();
        if let Some(&bad) = cases.iter().find(|&&k| k >= n) {
            return Err(CdError::InvalidParameter(format!(
                "case {} out of range for {} cases",
                bad, n
            )));
        }
        self.load(|icase| cases[icase], n, xx, yy, ww)
    }

    fn load<F>(&mut self, case_of: F, n: usize, xx: &[f64], yy: &[f64], ww: Option<&[f64]>) -> Result<()>
    where
        F: Fn(usize) -> usize,
    {
        let nvars = self.nvars;
        let ncases = self.ncases;

        if xx.len() < n * nvars {
            return Err(CdError::DataLength {
                what: "predictor matrix",
                expected: n * nvars,
                got: xx.len(),
            });
        }
        if yy.len() < n {
            return Err(CdError::DataLength {
                what: "target vector",
                expected: n,
                got: yy.len(),
            });
        }

        match (self.weighted, ww) {
            (true, Some(ww)) => {
                if ww.len() < n {
                    return Err(CdError::DataLength {
                        what: "weight vector",
                        expected: n,
                        got: ww.len(),
                    });
                }
                for (icase, w) in self.w.iter_mut().enumerate() {
                    *w = ww[case_of(icase)];
                }
                normalize_weights(&mut self.w).ok_or_else(|| {
                    CdError::InvalidParameter(
                        "weights must be non-negative with a positive sum".to_string(),
                    )
                })?;
            }
            (false, None) => self.w.fill(1.0 / ncases as f64),
            (true, None) => {
                return Err(CdError::InvalidParameter(
                    "weighted engine needs case weights".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(CdError::InvalidParameter(
                    "case weights given to an unweighted engine".to_string(),
                ));
            }
        }

        for ivar in 0..nvars {
            let raw = (0..ncases).map(|icase| xx[case_of(icase) * nvars + ivar]);
            let m = weighted_moments(raw.clone(), &self.w);
            self.scaling.xmeans[ivar] = m.mean;
            self.scaling.xscales[ivar] = m.scale;

            let col = &mut self.x[ivar * ncases..(ivar + 1) * ncases];
            if m.constant {
                col.fill(0.0);
            } else {
                for (dst, v) in col.iter_mut().zip(raw) {
                    *dst = (v - m.mean) / m.scale;
                }
            }
            self.xssvec[ivar] = weighted_dot(&self.w, col, col);
        }

        let raw = (0..ncases).map(|icase| yy[case_of(icase)]);
        let m = weighted_moments(raw.clone(), &self.w);
        self.scaling.ymean = m.mean;
        self.scaling.yscale = m.scale;
        if m.constant {
            self.y.fill(0.0);
        } else {
            for (dst, v) in self.y.iter_mut().zip(raw) {
                *dst = (v - m.mean) / m.scale;
            }
        }
        self.yss = weighted_dot(&self.w, &self.y, &self.y);

        if let Some(cache) = self.cache.as_mut() {
            for ivar in 0..nvars {
                let col_i = &self.x[ivar * ncases..(ivar + 1) * ncases];
                cache.yinner[ivar] = weighted_dot(&self.w, col_i, &self.y);
                for jvar in 0..nvars {
                    cache.xinner[ivar * nvars + jvar] = if jvar == ivar {
                        self.xssvec[ivar]
                    } else if jvar < ivar {
                        cache.xinner[jvar * nvars + ivar]
                    } else {
                        let col_j = &self.x[jvar * ncases..(jvar + 1) * ncases];
                        weighted_dot(&self.w, col_i, col_j)
                    };
                }
            }
        }

        self.beta.fill(0.0);
        self.resid.copy_from_slice(&self.y);
        if let Some(cache) = self.cache.as_mut() {
            cache.grad.copy_from_slice(&cache.yinner);
        }
        self.explained = 0.0;
        self.loaded = true;
        Ok(())
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    pub fn ncases(&self) -> usize {
        self.ncases
    }

    pub fn covar_updates(&self) -> bool {
        self.cache.is_some()
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Set the coefficients a warm-started fit begins from.
    pub fn set_beta(&mut self, beta: &[f64]) -> Result<()> {
        if beta.len() != self.nvars {
            return Err(CdError::InvalidDimensions(format!(
                "{} coefficients for {} variables",
                beta.len(),
                self.nvars
            )));
        }
        self.beta.copy_from_slice(beta);
        Ok(())
    }

    /// Standardized target minus the current fit.
    pub fn residual(&self) -> &[f64] {
        &self.resid
    }

    /// Fraction of target variance explained by the last fit.
    pub fn explained(&self) -> f64 {
        self.explained
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// Standardized predictor column `ivar`.
    pub fn column(&self, ivar: usize) -> &[f64] {
        &self.x[ivar * self.ncases..(ivar + 1) * self.ncases]
    }

    /// Standardized target.
    pub fn target(&self) -> &[f64] {
        &self.y
    }

    /// Snapshot of the current coefficients with their normalization.
    pub fn fitted(&self, alpha: f64, lambda: f64) -> FittedModel {
        FittedModel {
            alpha,
            lambda,
            beta: self.beta.clone(),
            scaling: self.scaling.clone(),
            explained: self.explained,
        }
    }
}
