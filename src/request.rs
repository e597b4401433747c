use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// Which water service a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DataCategory {
    /// Daily aggregate values (`dv`).
    Daily,
    /// Instantaneous readings (`iv`).
    #[default]
    Instantaneous,
}

impl DataCategory {
    pub const ALL: [DataCategory; 2] = [DataCategory::Daily, DataCategory::Instantaneous];

    /// Service path segment and CLI spelling.
    pub fn code(self) -> &'static str {
        match self {
            DataCategory::Daily => "dv",
            DataCategory::Instantaneous => "iv",
        }
    }

    /// Label stored in each variable's `variable_data_type` attribute.
    pub fn label(self) -> &'static str {
        match self {
            DataCategory::Daily => "daily value",
            DataCategory::Instantaneous => "instantaneous value",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| Error::InvalidCategory(s.to_string()))
    }
}

/// Site identifiers given either as a single token or a list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sites(Vec<String>);

impl Sites {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Sites {
    fn from(value: &str) -> Self {
        Sites(vec![value.to_string()])
    }
}

impl From<String> for Sites {
    fn from(value: String) -> Self {
        Sites(vec![value])
    }
}

impl From<&String> for Sites {
    fn from(value: &String) -> Self {
        Sites(vec![value.clone()])
    }
}

impl From<Vec<String>> for Sites {
    fn from(value: Vec<String>) -> Self {
        Sites(value)
    }
}

impl From<Vec<&str>> for Sites {
    fn from(value: Vec<&str>) -> Self {
        Sites(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Sites {
    fn from(value: [&str; N]) -> Self {
        Sites(value.into_iter().map(|s| s.to_string()).collect())
    }
}

/// A retrieval request as the caller typed it. Nothing here is checked until
/// [`crate::validate`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub(crate) sites: Sites,
    pub(crate) start: String,
    pub(crate) end: String,
    pub(crate) category: String,
    pub(crate) parameter_codes: Vec<String>,
    pub(crate) output: Option<PathBuf>,
}

impl Request {
    pub fn new(sites: impl Into<Sites>) -> Self {
        Self {
            sites: sites.into(),
            start: String::new(),
            end: String::new(),
            category: DataCategory::default().code().to_string(),
            parameter_codes: Vec::new(),
            output: None,
        }
    }

    pub fn start(mut self, date: impl Into<String>) -> Self {
        self.start = date.into();
        self
    }

    pub fn end(mut self, date: impl Into<String>) -> Self {
        self.end = date.into();
        self
    }

    /// Accepts `"dv"`/`"iv"` or a [`DataCategory`].
    pub fn category(mut self, category: impl ToString) -> Self {
        self.category = category.to_string();
        self
    }

    /// Restrict the fetch to these parameter codes (e.g. `"00060"`).
    pub fn parameter_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Write the assembled dataset to this `.nc` path.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn sites(&self) -> &[String] {
        self.sites.as_slice()
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }
}
