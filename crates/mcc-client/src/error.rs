//! Error type for the Google Ads manager-account client.

use thiserror::Error;

use crate::campaign::{CampaignCreation, CampaignStep};

#[derive(Debug, Error)]
pub enum McError {
    /// Payload rejected before any request was sent
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the Google Ads API
    #[error("Google Ads API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Token exchange failed: {0}")]
    Token(String),

    #[error("Response did not contain a resource name")]
    MissingResourceName,

    #[error("Invalid customer ID: {0}")]
    InvalidCustomerId(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A required campaign step failed. `report` holds every step record,
    /// including the outcome of compensating already-created resources.
    #[error("Campaign creation failed at {step}: {source}")]
    StepFailed {
        step: CampaignStep,
        source: Box<McError>,
        report: Box<CampaignCreation>,
    },
}

impl McError {
    pub fn validation(message: impl Into<String>) -> Self {
        McError::Validation(message.into())
    }

    /// True when the error was produced without contacting Google.
    pub fn is_validation(&self) -> bool {
        matches!(self, McError::Validation(_) | McError::InvalidCustomerId(_))
    }
}

pub type Result<T> = std::result::Result<T, McError>;
