use anyhow::Result;
use cdnet::indicators::{generate_specs, MaSpec};
use cdnet::models::cd::{CvConfig, FoldScheme, DEFAULT_MIN_LAMBDA_RATIO};
use clap::Parser;
use serde::Deserialize;

/// Configuration for CD_MA analysis
#[derive(Debug, Clone, Deserialize, Parser)]
#[command(name = "cd_ma")]
#[command(about = "Moving Average Crossover Indicator Selection using Coordinate Descent")]
pub struct Config {
    /// Increment to long-term lookback
    #[arg(long, default_value_t = 6)]
    pub lookback_inc: usize,

    /// Number of long-term lookbacks to test
    #[arg(long, default_value_t = 6)]
    pub n_long: usize,

    /// Number of short-term lookbacks to test
    #[arg(long, default_value_t = 3)]
    pub n_short: usize,

    /// Alpha parameter for elastic net, at most 1; zero or less fits plain OLS
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub alpha: f64,

    /// Path to market data file (YYYYMMDD Price format)
    #[arg(value_name = "DATA_FILE")]
    pub data_file: String,

    /// Directory prefix for CD_MA.LOG and model.json
    #[arg(long, default_value = "results/")]
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Number of test cases (default: 252 = one year)
    #[arg(long, default_value_t = 252)]
    #[serde(default = "default_n_test")]
    pub n_test: usize,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 10)]
    #[serde(default = "default_n_folds")]
    pub n_folds: usize,

    /// Number of lambda values to test
    #[arg(long, default_value_t = 50)]
    #[serde(default = "default_n_lambdas")]
    pub n_lambdas: usize,

    /// Maximum iterations for coordinate descent
    #[arg(long, default_value_t = 1000)]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence tolerance during cross validation
    #[arg(long, default_value_t = 1e-9)]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Convergence tolerance for the final full-sample fit
    #[arg(long, default_value_t = 1e-7)]
    #[serde(default = "default_final_tolerance")]
    pub final_tolerance: f64,

    /// Smallest lambda as a fraction of the largest
    #[arg(long, default_value_t = DEFAULT_MIN_LAMBDA_RATIO)]
    #[serde(default = "default_min_lambda_ratio")]
    pub min_lambda_ratio: f64,

    /// Fold assignment: contiguous or interleaved
    #[arg(long, default_value = "contiguous")]
    #[serde(default)]
    pub fold_scheme: FoldScheme,

    /// Keep the predictor covariance cache during descent
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "default_covar_updates")]
    pub covar_updates: bool,
}

fn default_output_path() -> String {
    "results/".to_string()
}

fn default_n_test() -> usize {
    252
}

fn default_n_folds() -> usize {
    10
}

fn default_n_lambdas() -> usize {
    50
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-9
}

fn default_final_tolerance() -> f64 {
    1e-7
}

fn default_min_lambda_ratio() -> f64 {
    DEFAULT_MIN_LAMBDA_RATIO
}

fn default_covar_updates() -> bool {
    true
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha > 1.0 {
            anyhow::bail!("Alpha must be at most 1, got {}", self.alpha);
        }

        if self.lookback_inc == 0 {
            anyhow::bail!("lookback_inc must be greater than 0");
        }

        if self.n_long == 0 {
            anyhow::bail!("n_long must be greater than 0");
        }

        if self.n_short == 0 {
            anyhow::bail!("n_short must be greater than 0");
        }

        if self.n_test == 0 {
            anyhow::bail!("n_test must be greater than 0");
        }

        if self.n_folds < 2 {
            anyhow::bail!("n_folds must be at least 2");
        }

        if self.n_lambdas < 2 {
            anyhow::bail!("n_lambdas must be at least 2");
        }

        if !(self.tolerance > 0.0) || !(self.final_tolerance > 0.0) {
            anyhow::bail!("tolerances must be positive");
        }

        if !(self.min_lambda_ratio > 0.0 && self.min_lambda_ratio < 1.0) {
            anyhow::bail!(
                "min_lambda_ratio must be in (0, 1), got {}",
                self.min_lambda_ratio
            );
        }

        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Whether lambda is chosen by cross validation rather than fixed at zero
    pub fn regularized(&self) -> bool {
        self.alpha > 0.0
    }

    /// Get total number of indicator variables
    pub fn n_vars(&self) -> usize {
        self.n_long * self.n_short
    }

    /// Get maximum lookback period
    pub fn max_lookback(&self) -> usize {
        self.n_long * self.lookback_inc
    }

    pub fn specs(&self) -> Vec<MaSpec> {
        generate_specs(self.lookback_inc, self.n_long, self.n_short)
    }

    pub fn cv_config(&self) -> CvConfig {
        CvConfig {
            nfolds: self.n_folds,
            n_lambda: self.n_lambdas,
            alpha: self.alpha,
            maxits: self.max_iterations,
            eps: self.tolerance,
            fast_test: true,
            covar_updates: self.covar_updates,
            min_lambda_ratio: self.min_lambda_ratio,
            fold_scheme: self.fold_scheme,
        }
    }
}
