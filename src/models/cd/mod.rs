//! Elastic-net regression by coordinate descent.
//!
//! [`CoordinateDescent`] owns one standardized dataset and fits it for a
//! single `(alpha, lambda)` with [`core_train`](CoordinateDescent::core_train)
//! or along a descending lambda path with
//! [`lambda_train`](CoordinateDescent::lambda_train). [`cv_train`] picks lambda
//! by k-fold cross validation using only that public interface.
//!
//! ```no_run
//! use cdnet::models::cd::{cv_train, CoordinateDescent, CvConfig};
//!
//! # fn run(xx: &[f64], yy: &[f64], nvars: usize) -> cdnet::Result<()> {
//! let config = CvConfig::default();
//! let cv = cv_train(nvars, xx, yy, None, &config)?;
//!
//! let mut cd = CoordinateDescent::new(nvars, yy.len(), false, true, 0)?;
//! cd.get_data(0, yy.len(), xx, yy, None)?;
//! cd.core_train(config.alpha, cv.lambda, 1000, 1e-7, true, false)?;
//! let model = cd.fitted(config.alpha, cv.lambda);
//! # Ok(())
//! # }
//! ```

mod cv;
mod engine;
mod fitted;
mod path;
mod solver;
mod standardize;

pub use cv::{best_lambda_index, cv_train, fold_cases, CvConfig, CvResult, FoldScheme};
pub use engine::{CoordinateDescent, DEFAULT_MIN_LAMBDA_RATIO};
pub use fitted::FittedModel;
pub use solver::{soft_threshold, TrainOutcome};
pub use standardize::Scaling;
