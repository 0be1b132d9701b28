//! Turns a decoded response into what the front end shows.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::FetchError;
use crate::response::RawResponse;

/// Prefix of a successful text-mode result.
pub const TEXT_PREFIX: &str = "SOAP response:\n\n";

/// Text-mode fallback when there is no response.
pub const NO_DATA_TEXT: &str = "No Data";

/// How a result is presented: one row per city, or the raw response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    List,
    Text,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(DisplayMode::List),
            "text" => Ok(DisplayMode::Text),
            other => Err(format!("unknown display mode '{other}' (expected list or text)")),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::List => write!(f, "list"),
            DisplayMode::Text => write!(f, "text"),
        }
    }
}

/// The outcome of one fetch, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayResult {
    Cities(Vec<String>),
    Text(String),
}

impl DisplayResult {
    /// True for the empty-state result of either mode.
    pub fn is_no_data(&self) -> bool {
        match self {
            DisplayResult::Cities(cities) => cities.is_empty(),
            DisplayResult::Text(text) => text == NO_DATA_TEXT,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        match self {
            DisplayResult::Cities(_) => DisplayMode::List,
            DisplayResult::Text(_) => DisplayMode::Text,
        }
    }
}

pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Format `raw` for `mode`. Only list mode can fail, when the city
    /// dataset inside the response is unreadable.
    pub fn format(
        mode: DisplayMode,
        raw: Option<&RawResponse>,
    ) -> Result<DisplayResult, FetchError> {
        match (mode, raw) {
            (DisplayMode::List, Some(raw)) => Ok(DisplayResult::Cities(raw.city_names()?)),
            (DisplayMode::Text, Some(raw)) => Ok(DisplayResult::Text(format!("{TEXT_PREFIX}{raw}"))),
            (_, None) => Ok(Self::no_data(mode)),
        }
    }

    /// The empty-state result for `mode`.
    pub fn no_data(mode: DisplayMode) -> DisplayResult {
        match mode {
            DisplayMode::List => DisplayResult::Cities(Vec::new()),
            DisplayMode::Text => DisplayResult::Text(NO_DATA_TEXT.to_string()),
        }
    }
}
