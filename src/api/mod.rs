//! Dashboard backend API
//!
//! ## Table of Contents
//! - **DashboardClient**: Typed client for the `/api/dashboard` endpoints
//! - **ApiError**: Failures talking to the backend
//! - **types**: Response payloads
//! - **DashboardSnapshot**: All overview panels fetched in one go

pub mod client;
pub mod types;

pub use client::{DashboardClient, DashboardSnapshot, Panel, PanelFailure, THREAT_API_ENV};
pub use types::*;

use thiserror::Error;

/// Result type for API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Dashboard API errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Backend answered with a non-success status
    #[error("API error {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body as text
        body: String,
    },

    /// Request could not be sent or the body not read
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    Decode(String),

    /// Unknown threat workflow status
    #[error("invalid threat status: {0}")]
    InvalidStatus(String),
}

impl ApiError {
    /// HTTP status, if the backend answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
