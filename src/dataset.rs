//! Labeled multidimensional dataset: named dimensions, coordinate arrays,
//! data arrays and attributes, in the layout NetCDF files use.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const TIME_DIM: &str = "datetime";
pub const SITE_DIM: &str = "site_no";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Float(f64),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Array contents, flattened row-major over the variable's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Float(Vec<f64>),
    Text(Vec<String>),
    Time(Vec<DateTime<Utc>>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Float(v) => v.len(),
            Values::Text(v) => v.len(),
            Values::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Values::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Values::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&[DateTime<Utc>]> {
        match self {
            Values::Time(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub values: Values,
    pub attrs: Attributes,
}

impl Variable {
    pub fn new(name: impl Into<String>, dims: &[&str], values: Values) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
            attrs: Attributes::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationDataset {
    pub(crate) dims: Vec<(String, usize)>,
    pub(crate) coords: Vec<Variable>,
    pub(crate) data_vars: Vec<Variable>,
    pub(crate) attrs: Attributes,
}

impl ObservationDataset {
    /// Dimensions in declaration order.
    pub fn dims(&self) -> &[(String, usize)] {
        &self.dims
    }

    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.iter().find(|(d, _)| d == name).map(|(_, n)| *n)
    }

    pub fn coords(&self) -> &[Variable] {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.iter().find(|v| v.name == name)
    }

    pub fn data_vars(&self) -> &[Variable] {
        &self.data_vars
    }

    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.iter().find(|v| v.name == name)
    }

    pub fn data_var_names(&self) -> impl Iterator<Item = &str> {
        self.data_vars.iter().map(|v| v.name.as_str())
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Time coordinate values.
    pub fn times(&self) -> &[DateTime<Utc>] {
        self.coord(TIME_DIM)
            .and_then(|c| c.values.as_time())
            .unwrap_or_default()
    }

    /// Site coordinate values; empty for a single-site dataset.
    pub fn sites(&self) -> &[String] {
        self.coord(SITE_DIM)
            .and_then(|c| c.values.as_text())
            .unwrap_or_default()
    }

    pub fn is_multi_site(&self) -> bool {
        self.dim_len(SITE_DIM).is_some()
    }

    /// Merge extra global attributes; existing keys are overwritten.
    pub fn merge_attrs(&mut self, attrs: impl IntoIterator<Item = (String, AttrValue)>) {
        self.attrs.extend(attrs);
    }
}
