use anyhow::{Context, Result};
use cd_ma::search::n_bar_returns;
use cd_ma::{logging, run_search, SearchConfig};
use cdnet::core::io::read_price_file;
use cdnet::estimators::StocBias;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

/// Command-line arguments for bias estimation
#[derive(Parser, Debug)]
#[command(name = "stoc_bias")]
#[command(about = "Estimate training bias of a random MA crossover search")]
struct Args {
    /// Path to market data file (YYYYMMDD Price format)
    #[arg(value_name = "DATA_FILE")]
    data_file: PathBuf,

    /// Longest long-term lookback to try
    #[arg(long, default_value_t = 100)]
    max_lookback: usize,

    /// Number of random trials
    #[arg(long, default_value_t = 1000)]
    n_random: usize,

    /// Number of greedy refinement passes
    #[arg(long, default_value_t = 100)]
    n_refine: usize,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    println!("STOC_BIAS - Training bias of a stochastic MA crossover search\n");

    let prices = read_price_file(&args.data_file)
        .with_context(|| format!("reading {}", args.data_file.display()))?;

    let nreturns = n_bar_returns(prices.len(), args.max_lookback);
    let mut bias = StocBias::new(nreturns)
        .with_context(|| format!("{} prices leave {} bar returns", prices.len(), nreturns))?;

    let config = SearchConfig {
        max_lookback: args.max_lookback,
        n_random: args.n_random,
        n_refine: args.n_refine,
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let outcome = run_search(&prices, &config, &mut bias, &mut rng)?;

    println!(
        "Best system: long {} short {} (total log return {:.5})",
        outcome.best.long_lookback,
        outcome.best.short_lookback(),
        outcome.best_return
    );
    println!("Random trials counted: {}", outcome.trials);
    println!("  In-sample return:     {:.5}", outcome.estimate.is_return);
    println!("  Out-of-sample return: {:.5}", outcome.estimate.oos_return);
    println!("  Bias:                 {:.5}", outcome.estimate.bias);
    println!(
        "  Expected return net of bias: {:.5}",
        outcome.best_return - outcome.estimate.bias
    );

    Ok(())
}
