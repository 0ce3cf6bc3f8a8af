use anyhow::{Context, Result};
use cd_ma::{compute_indicator_data, evaluate_model, load_model, logging, Config};
use cdnet::core::io::read_price_file;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for backtesting
#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Backtest a saved CD_MA model on unseen data")]
struct Args {
    /// Path to TOML configuration file (for indicator specs)
    #[arg(short, long)]
    config: PathBuf,

    /// Path to saved model file (JSON)
    #[arg(short, long)]
    model: PathBuf,

    /// Path to unseen market data file
    #[arg(short, long)]
    data: PathBuf,

    /// Path to output report file
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    println!("CD_MA Backtesting\n");

    info!(path = %args.config.display(), "loading configuration");
    let config = Config::from_file(&args.config)?;
    config.validate()?;

    info!(path = %args.model.display(), "loading model");
    let model = load_model(&args.model)?;

    let specs = config.specs();
    if specs.len() != model.nvars() {
        anyhow::bail!(
            "configuration defines {} indicators but the model has {} coefficients",
            specs.len(),
            model.nvars()
        );
    }

    let prices = read_price_file(&args.data)
        .with_context(|| format!("reading {}", args.data.display()))?;

    // Every bar with a full lookback and a next bar is a test case
    let max_lookback = config.max_lookback();
    if prices.len() <= max_lookback {
        anyhow::bail!("Insufficient data for backtesting");
    }
    let n_cases = prices.len() - max_lookback;
    println!("Computing indicators for {} cases...", n_cases);
    let test = compute_indicator_data(&prices, max_lookback - 1, n_cases, &specs)?;

    let evaluation = evaluate_model(&model, &test)?;

    let mut report = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    writeln!(report, "CD_MA Backtest")?;
    writeln!(report, "{}", "=".repeat(60))?;
    writeln!(report, "Model: {}", args.model.display())?;
    writeln!(report, "Data: {}", args.data.display())?;
    writeln!(report, "Alpha: {:.4}  Lambda: {:.6}", model.alpha, model.lambda)?;
    writeln!(report, "Active indicators: {} of {}", model.n_active(), model.nvars())?;
    writeln!(report, "Test cases: {}", n_cases)?;
    writeln!(
        report,
        "Total return: {:.5} ({:.3}%)",
        evaluation.oos_return, evaluation.oos_return_pct
    )?;
    writeln!(
        report,
        "Bars long: {}  Bars short: {}",
        evaluation.n_long, evaluation.n_short
    )?;

    println!(
        "OOS total return: {:.5} ({:.3}%)",
        evaluation.oos_return, evaluation.oos_return_pct
    );
    println!("Report written to {}", args.output.display());
    Ok(())
}
