use anyhow::{Context, Result};
use cd_ma::*;
use cdnet::core::io::{read_price_file, split_train_test};
use clap::Parser;
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    println!("CD_MA - Moving Average Crossover Indicator Selection\n");

    let config = Config::parse();
    config.validate()?;

    info!(file = %config.data_file, "loading market data");
    let prices = read_price_file(&config.data_file)
        .with_context(|| format!("reading {}", config.data_file))?;

    let split = split_train_test(prices.len(), config.max_lookback(), config.n_test)?;
    println!("Training cases: {}", split.n_train);
    println!("Test cases: {}", split.n_test);

    let specs = config.specs();
    println!("Total indicators: {}", specs.len());

    let train = compute_indicator_data(&prices, split.train_start, split.n_train, &specs)?;
    let training = train_with_cv(&config, &train)?;
    println!("Optimal lambda: {:.6}", training.lambda());

    let test = compute_indicator_data(&prices, split.test_start, split.n_test, &specs)?;
    let evaluation = evaluate_model(&training.model, &test)?;

    std::fs::create_dir_all(Path::new(&config.output_path))
        .with_context(|| format!("creating {}", config.output_path))?;
    let results_path = Path::new(&config.output_path).join("CD_MA.LOG");
    write_results(&results_path, &config, &training, &evaluation)?;
    let model_path = Path::new(&config.output_path).join("model.json");
    save_model(&model_path, &training.model)?;

    println!("\n{}", "=".repeat(60));
    println!("Summary");
    println!("{}", "=".repeat(60));
    println!(
        "  In-sample explained variance: {:.3}%",
        100.0 * evaluation.in_sample_explained
    );
    println!(
        "  Active indicators: {} of {}",
        training.model.n_active(),
        training.model.nvars()
    );
    println!(
        "  OOS total return: {:.5} ({:.3}%)",
        evaluation.oos_return, evaluation.oos_return_pct
    );
    println!("  Results: {}", results_path.display());
    println!("  Model: {}", model_path.display());

    Ok(())
}
