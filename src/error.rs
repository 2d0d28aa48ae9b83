use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// Main Application Error Type
// Only setup failures end up here; anything that goes wrong for a single item is an ItemError.

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read API key from {path}: {source}")]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("API key file {0} is empty")]
    EmptyCredential(PathBuf),
    #[error("Catalog Error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("No input: {0}")]
    NoInput(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Failed to open output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// Per-item failure taxonomy, converted to Outcome::Failed at the job boundary

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),
    #[error("Decoder did not finish within {0:?}")]
    DecodeTimeout(Duration),
    #[error("Could not parse model response after {attempts} attempt(s): {reason}")]
    ResponseParse {
        attempts: u32,
        reason: String,
        snippet: String,
    },
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Job did not finish within {0:?}")]
    JobTimeout(Duration),
    #[error("Failed to write output record: {0}")]
    Output(#[from] std::io::Error),
    #[error("Worker aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Service returned no text")]
    EmptyResponse,
    #[error("Malformed service payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
