use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::Path;

use crate::error::{CdError, Result};

/// Initial slot count for a price history; growth beyond it doubles.
const INITIAL_CAPACITY: usize = 2048;

/// Owned, growable history of log prices, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    log_prices: Vec<f64>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self {
            log_prices: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append a raw (positive) price, stored as its log.
    pub fn push_price(&mut self, price: f64) {
        self.log_prices.push(price.ln());
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.log_prices
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.log_prices
    }
}

impl Deref for PriceHistory {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.log_prices
    }
}

impl From<Vec<f64>> for PriceHistory {
    /// Wrap values that are already log prices.
    fn from(log_prices: Vec<f64>) -> Self {
        Self { log_prices }
    }
}

/// Read a market file of `YYYYMMDD price` lines into log prices.
pub fn read_price_file<P: AsRef<Path>>(filename: P) -> Result<PriceHistory> {
    let file = File::open(filename.as_ref())?;
    parse_prices(BufReader::new(file))
}

/// Parse `YYYYMMDD price` lines. The price may be separated from the date by
/// spaces, tabs or commas. Blank lines are skipped.
pub fn parse_prices<R: BufRead>(reader: R) -> Result<PriceHistory> {
    let mut history = PriceHistory::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parse_err = |msg: &str| CdError::Parse {
            line: line_num,
            msg: msg.to_string(),
        };

        let date = line.get(..8).ok_or_else(|| parse_err("line too short"))?;
        if !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_err("invalid date"));
        }

        let price = line[8..]
            .split([' ', '\t', ','])
            .find(|s| !s.is_empty())
            .ok_or_else(|| parse_err("no price found"))?
            .parse::<f64>()
            .map_err(|_| parse_err("invalid price"))?;

        if !price.is_finite() {
            return Err(parse_err("invalid price"));
        }
        if price <= 0.0 {
            return Err(parse_err("non-positive price"));
        }
        history.push_price(price);
    }

    if history.is_empty() {
        return Err(CdError::InsufficientData(
            "no prices found in market file".to_string(),
        ));
    }

    Ok(history)
}
