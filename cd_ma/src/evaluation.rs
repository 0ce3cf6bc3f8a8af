use anyhow::Result;
use cdnet::models::cd::FittedModel;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::indicators::IndicatorData;
use crate::training::TrainingResult;

/// Evaluation results
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    /// Out-of-sample total return (log)
    pub oos_return: f64,
    /// Out-of-sample return percentage
    pub oos_return_pct: f64,
    /// In-sample explained variance
    pub in_sample_explained: f64,
    pub n_long: usize,
    pub n_short: usize,
}

/// Trade each test bar in the direction of the model's prediction.
///
/// A positive prediction earns the next-bar log change, a negative one its
/// negation, and an exact zero stays flat.
pub fn evaluate_model(model: &FittedModel, test: &IndicatorData) -> Result<EvaluationResult> {
    if model.nvars() != test.n_vars {
        anyhow::bail!(
            "model has {} coefficients but the test data has {} indicators",
            model.nvars(),
            test.n_vars
        );
    }

    let mut oos_return = 0.0;
    let mut n_long = 0;
    let mut n_short = 0;
    for (icase, &target) in test.targets.iter().enumerate() {
        let pred = model.predict(test.row(icase));
        if pred > 0.0 {
            oos_return += target;
            n_long += 1;
        } else if pred < 0.0 {
            oos_return -= target;
            n_short += 1;
        }
    }

    let oos_return_pct = 100.0 * (oos_return.exp() - 1.0);
    info!(
        oos_return = format_args!("{:.5}", oos_return),
        pct = format_args!("{:.3}%", oos_return_pct),
        n_long,
        n_short,
        "out-of-sample evaluation"
    );

    Ok(EvaluationResult {
        oos_return,
        oos_return_pct,
        in_sample_explained: model.explained,
        n_long,
        n_short,
    })
}

/// Write results to file
pub fn write_results<P: AsRef<Path>>(
    path: P,
    config: &Config,
    training: &TrainingResult,
    evaluation: &EvaluationResult,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path.as_ref())?;

    writeln!(file, "CD_MA - Moving Average Crossover Indicator Selection")?;
    writeln!(file, "{}", "=".repeat(60))?;
    writeln!(file)?;

    writeln!(file, "Configuration:")?;
    writeln!(file, "  Lookback increment: {}", config.lookback_inc)?;
    writeln!(file, "  Number of long-term lookbacks: {}", config.n_long)?;
    writeln!(file, "  Number of short-term lookbacks: {}", config.n_short)?;
    writeln!(file, "  Alpha: {:.4}", config.alpha)?;
    writeln!(file, "  Total indicators: {}", config.n_vars())?;
    writeln!(file, "  Test cases: {}", config.n_test)?;
    writeln!(file)?;

    if let Some(cv) = &training.cv {
        writeln!(file, "Cross-Validation Results ({} folds):", config.n_folds)?;
        writeln!(file, "  Optimal lambda: {:.6}", cv.lambda)?;
        writeln!(file)?;
        writeln!(file, "  {:>10} {:>15}", "Lambda", "OOS Explained")?;
        writeln!(file, "  {}", "-".repeat(27))?;
        for (lambda, oos) in cv.lambdas.iter().zip(&cv.lambda_oos) {
            writeln!(file, "  {:>10.4} {:>15.4}", lambda, oos)?;
        }
        writeln!(file)?;
    } else {
        writeln!(file, "Alpha <= 0: ordinary least squares, lambda = 0")?;
        writeln!(file)?;
    }

    let beta = &training.model.beta;
    writeln!(
        file,
        "Beta Coefficients (In-sample explained variance: {:.3}%):",
        100.0 * evaluation.in_sample_explained
    )?;
    writeln!(
        file,
        "Row: long-term lookback | Columns: short-term lookback (small to large)"
    )?;
    writeln!(file)?;

    for (ilong, row) in beta.chunks(config.n_short).enumerate() {
        let long_lookback = (ilong + 1) * config.lookback_inc;
        write!(file, "{:5} ", long_lookback)?;
        for &b in row {
            if b != 0.0 {
                write!(file, "{:9.4}", b)?;
            } else {
                write!(file, "     ----")?;
            }
        }
        writeln!(file)?;
    }
    writeln!(file)?;

    writeln!(file, "Out-of-Sample Results:")?;
    writeln!(
        file,
        "  Total return: {:.5} ({:.3}%)",
        evaluation.oos_return, evaluation.oos_return_pct
    )?;
    writeln!(
        file,
        "  Bars long: {}  Bars short: {}",
        evaluation.n_long, evaluation.n_short
    )?;

    info!(path = %path.as_ref().display(), "results written");
    Ok(())
}
