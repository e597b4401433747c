use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("incorrect USGS site number: {0}")]
    InvalidSite(String),

    #[error("incorrect date format, expected YYYY-MM-DD: {0}")]
    InvalidDateFormat(String),

    #[error("start date {start} is after end date {end}")]
    InvalidDateOrder { start: String, end: String },

    #[error("incorrect data category '{0}': use 'dv' for daily values or 'iv' for instantaneous values")]
    InvalidCategory(String),

    #[error("incorrect NetCDF output path (expected a .nc file): {}", .0.display())]
    InvalidOutputPath(PathBuf),

    #[error("data is not available: {0}")]
    NoDataAvailable(String),

    #[error("metadata lookup failed: {0}")]
    MetadataLookup(String),

    #[error("failed to write {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status} for {url}")]
    Service { status: u16, url: String },

    #[error("malformed service response: {0}")]
    Parse(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// True for the errors raised by input validation, before any data fetch.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidSite(_)
                | Error::InvalidDateFormat(_)
                | Error::InvalidDateOrder { .. }
                | Error::InvalidCategory(_)
                | Error::InvalidOutputPath(_)
        )
    }
}
