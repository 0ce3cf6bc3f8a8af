use anyhow::{Context, Result};
use cdnet::models::cd::FittedModel;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write a fitted model as pretty JSON.
pub fn save_model<P: AsRef<Path>>(path: P, model: &FittedModel) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create model file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, model)
        .with_context(|| format!("Failed to write model file: {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<FittedModel> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open model file: {}", path.display()))?;
    let model: FittedModel = serde_json::from_reader(BufReader::new(file))
        .with_context(|| "Failed to parse model file")?;

    if model.scaling.nvars() != model.nvars() {
        anyhow::bail!(
            "model file has {} coefficients but {} normalization entries",
            model.nvars(),
            model.scaling.nvars()
        );
    }
    Ok(model)
}
