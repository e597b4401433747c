#![forbid(unsafe_code)]

//! Rust client for USGS NWIS water data.
//!
//! A [`Request`] names one or more monitoring sites, a date range and a data
//! category (`iv` for instantaneous readings, `dv` for daily values). The
//! [`Client`] validates it, fetches the observation table from the water
//! services once, keeps one value column per parameter code, looks up site
//! and variable metadata, and assembles a labeled [`ObservationDataset`] that
//! can be written to a NetCDF file.
//!
//! **Quick start**
//! ```no_run
//! use nwis::{Client, ClientOptions, Request};
//!
//! let client = Client::new(ClientOptions::default())?;
//! let req = Request::new("03339000")
//!     .start("2020-01-01")
//!     .end("2020-01-02")
//!     .category("iv")
//!     .output("usgs_data.nc");
//! let dataset = client.get_data(&req)?;
//! for name in dataset.data_var_names() {
//!     println!("{name}");
//! }
//! # Ok::<(), nwis::Error>(())
//! ```
//!
//! **Several sites, daily values, selected parameters**
//! ```no_run
//! use nwis::{Client, ClientOptions, DataCategory, Request};
//!
//! let client = Client::new(ClientOptions::from_env())?;
//! let req = Request::new(["03339000", "01542500"])
//!     .start("2020-01-01")
//!     .end("2020-01-31")
//!     .category(DataCategory::Daily)
//!     .parameter_codes(["00060", "00065"]);
//! let retrieval = client.retrieve(&req)?;
//! println!("{} sites", retrieval.dataset.sites().len());
//! # Ok::<(), nwis::Error>(())
//! ```
//!
//! Notes:
//! - Files are written in the NetCDF classic format by [`ClassicWriter`], which
//!   needs no native library. The `netcdf` feature adds a libnetcdf-backed
//!   `NetcdfWriter`.
//! - A failed write is logged and the dataset is still returned unless
//!   [`ClientOptions::persist_failure`] is [`PersistFailure::Abort`].

mod assemble;
mod client;
mod dataset;
mod date;
mod error;
mod metadata;
mod persist;
mod rdb;
mod request;
mod reshape;
mod service;
mod table;

#[cfg(test)]
mod testing;

pub use crate::assemble::assemble;
pub use crate::client::{
    Client, ClientOptions, DEFAULT_PARAMETER_URL, DEFAULT_SERVICE_URL, PersistFailure, Retrieval,
    ValidatedRequest, get_data, validate,
};
pub use crate::dataset::{AttrValue, Attributes, ObservationDataset, SITE_DIM, TIME_DIM, Values, Variable};
pub use crate::date::DateRange;
pub use crate::error::{Error, Result};
pub use crate::metadata::{
    BUILTIN_VARIABLES, LookupCache, SiteMetadata, SiteMetadataMap, VariableMetadata,
    VariableMetadataMap, builtin_variable, parse_parameter_info, resolve_sites, resolve_variables,
};
#[cfg(feature = "netcdf")]
pub use crate::persist::NetcdfWriter;
pub use crate::persist::{ClassicWriter, DatasetWriter};
pub use crate::rdb::RdbTable;
pub use crate::request::{DataCategory, Request, Sites};
pub use crate::reshape::{COLUMN_SUFFIXES, Series, TimeSeriesTable, reshape, resolve_column, variable_codes};
pub use crate::service::{NwisSource, WaterServices, observation_table};
pub use crate::table::{Column, ColumnData, ObservationTable, RowIndex};
