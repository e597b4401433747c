//! Offline stand-in for the USGS water services.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;

use nwis::{DataCategory, DateRange, Error, NwisSource, ObservationTable, RdbTable, Result};

pub const VERMILION: &str = "03339000";
pub const VERMILION_NAME: &str = "VERMILION RIVER NEAR DANVILLE, IL";
pub const SUSQUEHANNA: &str = "01542500";
pub const SUSQUEHANNA_NAME: &str = "WB SUSQUEHANNA RIVER AT KARTHAUS, PA";

/// Instantaneous payload for one site: discharge, gage height and a Hach
/// temperature sensor, each with a qualifier column.
pub const IV_VERMILION: &str = "\
# Data provided for site 03339000
#            TS   parameter     Description
#        166638       00060     Discharge, cubic feet per second
#        166639       00065     Gage height, feet
#        259487       00010     Temperature, water, degrees Celsius [Hach]
#
agency_cd\tsite_no\tdatetime\ttz_cd\t166638_00060\t166638_00060_cd\t166639_00065\t166639_00065_cd\t259487_00010\t259487_00010_cd
5s\t15s\t20d\t6s\t14n\t10s\t14n\t10s\t14n\t10s
USGS\t03339000\t2020-01-01 00:00\tCST\t1370\tA\t5.12\tA\t1.2\tA
USGS\t03339000\t2020-01-01 00:15\tCST\t1360\tA\t5.11\tA\t1.2\tA
USGS\t03339000\t2020-01-01 00:30\tCST\t\tA\t5.10\tA\t1.3\tA
";

pub struct FakeServices {
    sites: BTreeMap<String, (String, f64)>,
    observations: Option<String>,
    parameters: BTreeMap<String, String>,
    pub fetches: Cell<usize>,
    pub site_lookups: Cell<usize>,
    pub parameter_lookups: Cell<usize>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self {
            sites: BTreeMap::new(),
            observations: None,
            parameters: BTreeMap::new(),
            fetches: Cell::new(0),
            site_lookups: Cell::new(0),
            parameter_lookups: Cell::new(0),
        }
    }

    pub fn vermilion() -> Self {
        Self::new()
            .site(VERMILION, VERMILION_NAME, 40.10141)
            .observations(IV_VERMILION)
    }

    pub fn site(mut self, code: &str, name: &str, latitude: f64) -> Self {
        self.sites.insert(code.into(), (name.into(), latitude));
        self
    }

    pub fn observations(mut self, rdb: &str) -> Self {
        self.observations = Some(rdb.into());
        self
    }

    pub fn parameter(mut self, code: &str, rdb: &str) -> Self {
        self.parameters.insert(code.into(), rdb.into());
        self
    }
}

impl NwisSource for FakeServices {
    fn site_records(&self, sites: &[String]) -> Result<RdbTable> {
        self.site_lookups.set(self.site_lookups.get() + 1);
        let rows = sites
            .iter()
            .filter_map(|s| {
                let wanted = s.trim_start_matches('0');
                self.sites
                    .iter()
                    .find(|(code, _)| code.trim_start_matches('0') == wanted)
                    .map(|(code, (name, lat))| (code, name, lat))
            })
            .map(|(code, name, lat)| {
                vec![
                    code.clone(),
                    name.clone(),
                    lat.to_string(),
                    "-87.5969".into(),
                    "518.02".into(),
                    "NAD83".into(),
                ]
            })
            .collect();
        Ok(RdbTable {
            comments: Vec::new(),
            columns: ["site_no", "station_nm", "dec_lat_va", "dec_long_va", "alt_va", "dec_coord_datum_cd"]
                .map(String::from)
                .to_vec(),
            types: vec!["15s".into(); 6],
            rows,
        })
    }

    fn observations(
        &self,
        sites: &[String],
        _range: &DateRange,
        _category: DataCategory,
        _parameter_codes: &[String],
    ) -> Result<ObservationTable> {
        self.fetches.set(self.fetches.get() + 1);
        match &self.observations {
            Some(text) => nwis::observation_table(text, sites.len() > 1),
            None => Ok(ObservationTable::empty()),
        }
    }

    fn parameter_info(&self, code: &str) -> Result<String> {
        self.parameter_lookups.set(self.parameter_lookups.get() + 1);
        self.parameters
            .get(code)
            .cloned()
            .ok_or_else(|| Error::Service {
                status: 404,
                url: format!("fake://parameter/{code}"),
            })
    }
}
