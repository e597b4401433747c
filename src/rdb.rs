//! Reader for the tab-delimited RDB text format used by the USGS water
//! services and the parameter-code lookup.
//!
//! A payload is one or more blocks. Each block is a run of `#` comment
//! lines, a row of column names, a row of column type codes (`5s`, `16d`,
//! ...), then tab-separated data rows. A comment line after data starts the
//! next block; multi-site responses carry one block per site.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RdbTable {
    pub comments: Vec<String>,
    pub columns: Vec<String>,
    pub types: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RdbTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Case-insensitive lookup over a list of accepted spellings, in order.
    pub fn find_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| {
            self.columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(n))
        })
    }

    /// Cell by row and column name; blank cells read as `None`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        non_blank(self.rows.get(row)?.get(idx)?)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Parse every block of an RDB payload.
pub fn parse_blocks(text: &str) -> Result<Vec<RdbTable>> {
    let mut blocks = Vec::new();
    let mut current = RdbTable::default();
    let mut header_rows = 0usize;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.starts_with('#') {
            if header_rows == 2 {
                blocks.push(std::mem::take(&mut current));
                header_rows = 0;
            }
            current.comments.push(line.to_string());
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match header_rows {
            0 => {
                current.columns = line.split('\t').map(|c| c.trim().to_string()).collect();
                header_rows = 1;
            }
            1 => {
                current.types = line.split('\t').map(|c| c.trim().to_string()).collect();
                if current.types.len() != current.columns.len() {
                    return Err(Error::Parse(format!(
                        "line {}: {} type codes for {} columns",
                        lineno + 1,
                        current.types.len(),
                        current.columns.len()
                    )));
                }
                header_rows = 2;
            }
            _ => {
                let mut cells: Vec<String> = line.split('\t').map(|c| c.to_string()).collect();
                if cells.len() > current.columns.len() {
                    return Err(Error::Parse(format!(
                        "line {}: {} fields for {} columns",
                        lineno + 1,
                        cells.len(),
                        current.columns.len()
                    )));
                }
                cells.resize(current.columns.len(), String::new());
                current.rows.push(cells);
            }
        }
    }

    match header_rows {
        2 => blocks.push(current),
        1 => {
            return Err(Error::Parse(
                "payload ends after the column names, type row missing".into(),
            ));
        }
        _ => {}
    }

    Ok(blocks)
}

/// Parse a payload expected to hold a single block. Extra blocks with the same
/// columns are appended; a payload without any header is an empty table.
pub fn parse(text: &str) -> Result<RdbTable> {
    let mut blocks = parse_blocks(text)?.into_iter();
    let Some(mut table) = blocks.next() else {
        return Ok(RdbTable::default());
    };
    for block in blocks {
        if block.columns != table.columns {
            return Err(Error::Parse("blocks disagree on column layout".into()));
        }
        table.comments.extend(block.comments);
        table.rows.extend(block.rows);
    }
    Ok(table)
}
