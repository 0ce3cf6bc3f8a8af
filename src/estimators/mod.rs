pub mod stochastic_bias;

pub use stochastic_bias::{BiasEstimate, StocBias};
