//! In-memory [`NwisSource`] for unit tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::date::DateRange;
use crate::error::{Error, Result};
use crate::metadata::same_site;
use crate::rdb::RdbTable;
use crate::request::DataCategory;
use crate::service::NwisSource;
use crate::table::ObservationTable;

#[derive(Debug, Default)]
pub struct FakeSource {
    sites: BTreeMap<String, String>,
    parameters: BTreeMap<String, String>,
    table: Option<ObservationTable>,
    fail_sites: bool,
    site_calls: Cell<usize>,
    observation_calls: Cell<usize>,
    parameter_calls: Cell<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, code: &str, name: &str) -> Self {
        self.sites.insert(code.to_string(), name.to_string());
        self
    }

    pub fn with_parameter(mut self, code: &str, text: &str) -> Self {
        self.parameters.insert(code.to_string(), text.to_string());
        self
    }

    pub fn with_table(mut self, table: ObservationTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Make every site lookup fail with a transport error.
    pub fn failing_sites(mut self) -> Self {
        self.fail_sites = true;
        self
    }

    pub fn site_calls(&self) -> usize {
        self.site_calls.get()
    }

    pub fn observation_calls(&self) -> usize {
        self.observation_calls.get()
    }

    pub fn parameter_calls(&self) -> usize {
        self.parameter_calls.get()
    }
}

impl NwisSource for FakeSource {
    fn site_records(&self, sites: &[String]) -> Result<RdbTable> {
        self.site_calls.set(self.site_calls.get() + 1);
        if self.fail_sites {
            return Err(Error::Service {
                status: 503,
                url: "fake://site".into(),
            });
        }
        let columns = ["site_no", "station_nm", "dec_lat_va", "dec_long_va", "alt_va", "dec_coord_datum_cd"];
        let rows = sites
            .iter()
            .filter_map(|s| self.sites.iter().find(|(code, _)| same_site(code, s)))
            .map(|(code, name)| {
                vec![
                    code.clone(),
                    name.clone(),
                    "40.1".into(),
                    "-87.6".into(),
                    "518.0".into(),
                    "NAD83".into(),
                ]
            })
            .collect();
        Ok(RdbTable {
            comments: Vec::new(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            types: vec!["10s".to_string(); columns.len()],
            rows,
        })
    }

    fn observations(
        &self,
        _sites: &[String],
        _range: &DateRange,
        _category: DataCategory,
        _parameter_codes: &[String],
    ) -> Result<ObservationTable> {
        self.observation_calls.set(self.observation_calls.get() + 1);
        Ok(self.table.clone().unwrap_or_else(ObservationTable::empty))
    }

    fn parameter_info(&self, code: &str) -> Result<String> {
        self.parameter_calls.set(self.parameter_calls.get() + 1);
        self.parameters.get(code).cloned().ok_or_else(|| Error::Service {
            status: 404,
            url: format!("fake://parameter/{code}"),
        })
    }
}
