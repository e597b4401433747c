//! Column selection and renaming for raw observation tables.
//!
//! The service names one variable's value column inconsistently: the bare
//! parameter code for instantaneous values, `<code>_Mean` for daily means,
//! and a method tag (`_hach`) when a second sensor reports the same
//! parameter. Qualifier (`_cd`), minimum and maximum columns share the code
//! prefix but never match a value variant, so they drop out here.

use tracing::debug;

use crate::error::{Error, Result};
use crate::table::{ColumnData, ObservationTable, RowIndex};

/// Suffix variants tried for each code, highest priority first.
pub const COLUMN_SUFFIXES: [&str; 4] = ["", "_Mean", "_hach", "_hach_Mean"];

/// One canonical value series, named by its bare parameter code.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub code: String,
    /// Column name the values came from, e.g. `00060_Mean`.
    pub source: String,
    /// Missing or non-numeric cells are NaN.
    pub values: Vec<f64>,
}

/// Reshaped table: the raw row index and one series per resolved code.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    index: RowIndex,
    series: Vec<Series>,
}

impl TimeSeriesTable {
    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.code.as_str())
    }

    /// Raw column names selected for each code, in series order.
    pub fn resolved_columns(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.source.as_str())
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }
}

/// Parameter codes present in a set of column names: the numeric token before
/// the first `_`, in order of first appearance.
pub fn variable_codes<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let prefix = bare_code(name);
        if !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_digit())
            && !out.iter().any(|c| c == prefix)
        {
            out.push(prefix.to_string());
        }
    }
    out
}

/// First column name among the suffix variants of `code` that the table has.
pub fn resolve_column<'a>(table: &'a ObservationTable, code: &str) -> Option<&'a str> {
    COLUMN_SUFFIXES.iter().find_map(|suffix| {
        let candidate = format!("{code}{suffix}");
        table.column(&candidate).map(|c| c.name.as_str())
    })
}

fn bare_code(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

/// Select one value column per code and rename it to the bare code.
///
/// With no `codes`, every numeric prefix found in the table is used. Fails
/// with [`Error::NoDataAvailable`] when the table is empty or nothing matches.
pub fn reshape(table: ObservationTable, codes: &[String]) -> Result<TimeSeriesTable> {
    if table.is_empty() {
        return Err(Error::NoDataAvailable(
            "the service returned no observations".into(),
        ));
    }

    let codes = if codes.is_empty() {
        variable_codes(table.column_names())
    } else {
        let mut unique: Vec<String> = Vec::new();
        for c in codes {
            if !unique.contains(c) {
                unique.push(c.clone());
            }
        }
        unique
    };

    let selected: Vec<(String, String)> = codes
        .iter()
        .filter_map(|code| match resolve_column(&table, code) {
            Some(name) => Some((code.clone(), name.to_string())),
            None => {
                debug!(code = %code, "no value column for parameter code");
                None
            }
        })
        .collect();

    if selected.is_empty() {
        return Err(Error::NoDataAvailable(format!(
            "no value column matches parameter code(s) {}",
            codes.join(", ")
        )));
    }

    let (index, columns) = table.into_parts();
    let mut series = Vec::with_capacity(selected.len());
    for (code, source) in selected {
        let Some(column) = columns.iter().find(|c| c.name == source) else {
            continue;
        };
        let values = match &column.data {
            ColumnData::Number(v) => v.iter().map(|x| x.unwrap_or(f64::NAN)).collect(),
            ColumnData::Text(v) => v
                .iter()
                .map(|x| {
                    x.as_deref()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect(),
        };
        debug!(code = %code, column = %source, "selected value column");
        series.push(Series {
            code,
            source,
            values,
        });
    }

    Ok(TimeSeriesTable { index, series })
}
