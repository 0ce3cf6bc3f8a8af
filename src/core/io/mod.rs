mod data;
mod market;

pub use data::*;
pub use market::*;
