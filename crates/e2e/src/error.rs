//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Scenario parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Unrecognized sort indicator: {0}")]
    UnrecognizedSortState(String),

    #[error("Row containing \"{fragment}\" not found after {attempts} scroll attempts. Total rows: {total_rows}")]
    RowNotFound {
        fragment: String,
        attempts: usize,
        total_rows: usize,
    },

    #[error("Search fragment must not be empty")]
    InvalidFragment,

    #[error("Selector conflict for \"{name}\": {existing} vs {incoming}")]
    SelectorConflict {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("No selector defined for {kind} \"{name}\"")]
    UnknownSelector { kind: &'static str, name: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Scenario context is missing {0}")]
    MissingContext(&'static str),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("XSRF-TOKEN cookie not found. Check that the login succeeded")]
    MissingCsrfToken,

    #[error("API request failed: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
