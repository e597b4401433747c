use chrono::{DateTime, Utc};

/// Row labels of an observation table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIndex {
    /// Single-site retrieval: one timestamp per row.
    Time(Vec<DateTime<Utc>>),
    /// Multi-site retrieval: (site, timestamp) per row.
    SiteTime(Vec<(String, DateTime<Utc>)>),
}

impl RowIndex {
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Time(t) => t.len(),
            RowIndex::SiteTime(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Tabular service response: labelled rows, named columns in service order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    index: RowIndex,
    columns: Vec<Column>,
}

impl ObservationTable {
    pub fn new(index: RowIndex) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(RowIndex::Time(Vec::new()))
    }

    /// Append a column. Its length must match the row index.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.push_column(name, data);
        self
    }

    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) {
        debug_assert_eq!(data.len(), self.index.len());
        self.columns.push(Column {
            name: name.into(),
            data,
        });
    }

    pub fn with_numbers(self, name: impl Into<String>, values: &[f64]) -> Self {
        self.with_column(name, ColumnData::Number(values.iter().copied().map(Some).collect()))
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn is_multi_site(&self) -> bool {
        matches!(self.index, RowIndex::SiteTime(_))
    }

    pub(crate) fn into_parts(self) -> (RowIndex, Vec<Column>) {
        (self.index, self.columns)
    }
}
