pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod journal;
pub mod media;
pub mod parser;
pub mod schema;
pub mod stats;
pub mod store;

pub use analysis::{AnalysisOptions, AnalysisProvider, OllamaAnalysisClient};
pub use config::AppConfig;
pub use db::Database;
pub use error::{CoreError, Result};
pub use journal::Journal;
pub use media::{MediaGenerator, NoMediaGenerator};
pub use parser::{ParsedAnalysis, ResponseParser};
pub use stats::StatsAggregator;
pub use store::RecordStore;
