pub mod config;
pub mod evaluation;
pub mod indicators;
pub mod logging;
pub mod model_io;
pub mod search;
pub mod training;

pub use config::Config;
pub use evaluation::{evaluate_model, write_results, EvaluationResult};
pub use indicators::{compute_indicator_data, IndicatorData};
pub use model_io::{load_model, save_model};
pub use search::{run_search, MaSystem, SearchConfig, SearchOutcome};
pub use training::{train_with_cv, TrainingResult};
