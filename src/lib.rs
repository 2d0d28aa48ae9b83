pub mod catalog;
pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inference;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod sampler;

#[cfg(test)]
mod test_support;

pub use config::Configuration;
pub use coordinator::{CoordinatorBuilder, WorkCoordinator};
pub use error::{AppError, CatalogError, InferenceError, ItemError};
pub use pipeline::{describe_pipeline, Outcome};
pub use progress::RunSummary;
