use anyhow::{Context, Result};
use cdnet::models::cd::{cv_train, CoordinateDescent, CvResult, FittedModel, TrainOutcome};
use tracing::{info, warn};

use crate::config::Config;
use crate::indicators::IndicatorData;

/// Result of model training
#[derive(Debug)]
pub struct TrainingResult {
    /// Final full-sample fit at the chosen lambda
    pub model: FittedModel,
    /// Cross-validation tables; absent when alpha <= 0 fixes lambda at zero
    pub cv: Option<CvResult>,
    pub outcome: TrainOutcome,
}

impl TrainingResult {
    pub fn lambda(&self) -> f64 {
        self.model.lambda
    }
}

/// Pick lambda by cross validation, then fit every training case with it.
pub fn train_with_cv(config: &Config, train: &IndicatorData) -> Result<TrainingResult> {
    let n_vars = train.n_vars;
    let n_cases = train.n_cases;

    if n_cases < n_vars + 10 {
        anyhow::bail!(
            "Insufficient training data: need at least {} cases, got {}",
            n_vars + 10,
            n_cases
        );
    }

    let (alpha, cv) = if config.regularized() {
        info!(n_folds = config.n_folds, "running cross validation");
        let cv = cv_train(n_vars, &train.data, &train.targets, None, &config.cv_config())
            .context("cross validation failed")?;
        (config.alpha, Some(cv))
    } else {
        info!("alpha <= 0, using lambda = 0 (no regularization)");
        (0.0, None)
    };
    let lambda = cv.as_ref().map_or(0.0, |cv| cv.lambda);

    info!(lambda = format_args!("{:.6}", lambda), "training final model");
    let mut cd = CoordinateDescent::new(n_vars, n_cases, false, config.covar_updates, 0)?;
    cd.get_data(0, n_cases, &train.data, &train.targets, None)?;
    let outcome = cd.core_train(
        alpha,
        lambda,
        config.max_iterations,
        config.final_tolerance,
        true,
        false,
    )?;
    if !outcome.converged {
        warn!(
            iterations = outcome.iterations,
            "final fit stopped at the iteration limit"
        );
    }

    let model = cd.fitted(alpha, lambda);
    info!(
        explained = format_args!("{:.3}%", 100.0 * model.explained),
        n_active = model.n_active(),
        "in-sample fit"
    );

    Ok(TrainingResult { model, cv, outcome })
}
