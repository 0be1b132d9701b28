//! Error types for the cities SOAP client.
//!
//! # Design
//! Three failure kinds exist and the controller folds all of them into the
//! same "no data" outcome. They are still kept apart here so the log line
//! written when a fetch is swallowed says what actually went wrong.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building, sending, or decoding a SOAP call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The query was empty or whitespace only; no request was built.
    #[error("empty query")]
    EmptyInput,

    /// The HTTP round-trip failed or returned an unexpected status.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The response body was not a usable SOAP envelope (bad XML, missing
    /// `Body`, a SOAP fault, or an unreadable city dataset).
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}

/// Errors returned while loading a [`crate::ServiceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
