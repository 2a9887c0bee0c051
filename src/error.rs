// ============================================================================
// File: src/error.rs
// Error types shared across the library
// ============================================================================

use std::time::Duration;

use thiserror::Error;

/// Failures talking to the generative backend.
///
/// Every caller in this crate absorbs these locally (empty offer list,
/// fallback tip, apology chat turn); they never reach the UI as-is.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error for model '{model}': HTTP {status}: {body}")]
    Api {
        model: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from model '{model}': {source}")]
    Decode {
        model: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model '{model}' returned no candidates")]
    NoCandidates { model: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures raised by the deal aggregator before any retailer is queried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("no retailers are configured")]
    NoRetailers,

    #[error("unknown retailer '{0}'")]
    UnknownRetailer(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown capacity '{0}' (expected 8GB, 16GB, 32GB or 64GB)")]
    UnknownCapacity(String),

    #[error("unknown memory generation '{0}' (expected DDR4 or DDR5)")]
    UnknownGeneration(String),

    #[error("invalid speed '{0}' (expected e.g. 6000MHz)")]
    InvalidSpeed(String),

    #[error("{speed} is not a valid {generation} speed")]
    UnsupportedSpeed { generation: String, speed: String },
}
