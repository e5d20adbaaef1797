pub mod backend;
pub mod config;
pub mod error;
pub mod imaging;
pub mod job;
pub mod pipeline;
pub mod polling;
pub mod replicate;

pub use config::{ConfigError, PollConfig, ServerConfig};
pub use error::StyleError;
pub use pipeline::{StyleJob, StylePipeline, StyleRequest};
