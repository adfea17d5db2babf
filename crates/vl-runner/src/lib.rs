//! `vecload`: drives concurrent virtual users against a vector store and
//! reports the recorded metrics.

pub mod args;
pub mod config;
pub mod data;
pub mod scenario;

pub use args::RunArgs;
pub use config::RunConfig;
pub use scenario::{RunReport, Scenario};
