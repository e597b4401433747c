//! Writing datasets to NetCDF files.
//!
//! [`ClassicWriter`] writes the classic format through the pure-Rust
//! `netcdf3` crate and needs no native library. With the `netcdf` feature,
//! [`NetcdfWriter`] writes the same layout through libnetcdf.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::Path;

use chrono::{DateTime, Utc};
use netcdf3::{DataSet, FileWriter, Version};
use tracing::debug;

use crate::dataset::{AttrValue, Attributes, ObservationDataset, Values, Variable};
use crate::error::{Error, Result};

pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";
pub const TIME_CALENDAR: &str = "proleptic_gregorian";

/// Sink for an assembled dataset.
pub trait DatasetWriter {
    fn write(&self, dataset: &ObservationDataset, path: &Path) -> Result<()>;
}

fn persistence(path: &Path, reason: impl ToString) -> Error {
    Error::Persistence {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn epoch_seconds(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
}

/// Attributes a variable carries on disk in addition to its own.
fn encoded_attrs(var: &Variable) -> Attributes {
    let mut attrs = var.attrs.clone();
    match &var.values {
        Values::Time(_) => {
            attrs.insert("standard_name".into(), "time".into());
            attrs.insert("units".into(), TIME_UNITS.into());
            attrs.insert("calendar".into(), TIME_CALENDAR.into());
        }
        Values::Float(_) => {
            attrs.insert("_FillValue".into(), AttrValue::Float(f64::NAN));
        }
        Values::Text(_) => {}
    }
    attrs
}

/// Writer for the NetCDF classic format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicWriter;

/// Variable contents in the form the classic format stores them.
enum Payload {
    Double(Vec<f64>),
    Char(Vec<u8>),
}

impl DatasetWriter for ClassicWriter {
    fn write(&self, dataset: &ObservationDataset, path: &Path) -> Result<()> {
        let (data_set, payloads) = classic_definition(dataset).map_err(|e| persistence(path, e))?;
        let mut writer = FileWriter::open(path).map_err(|e| persistence(path, invalid(e)))?;
        writer
            .set_def(&data_set, Version::Classic, 0)
            .map_err(|e| persistence(path, invalid(e)))?;
        for (name, payload) in &payloads {
            let written = match payload {
                Payload::Double(v) => writer.write_var_f64(name.as_str(), v),
                Payload::Char(v) => writer.write_var_u8(name.as_str(), v),
            };
            written.map_err(|e| persistence(path, invalid(e)))?;
        }
        writer.close().map_err(|e| persistence(path, invalid(e)))?;
        debug!(path = %path.display(), variables = payloads.len(), "wrote classic netcdf file");
        Ok(())
    }
}

fn invalid(e: impl Debug) -> String {
    format!("{e:?}")
}

fn dim_names(dims: &[String]) -> Vec<&str> {
    dims.iter().map(String::as_str).collect()
}

/// Header definition and per-variable payloads for `dataset`. Text arrays get
/// a trailing `string<N>` dimension sized to their longest value.
fn classic_definition(
    dataset: &ObservationDataset,
) -> std::result::Result<(DataSet, Vec<(String, Payload)>), String> {
    let mut ds = DataSet::new();
    let mut dims: BTreeSet<String> = BTreeSet::new();
    for (name, len) in dataset.dims() {
        ds.add_fixed_dim(name.as_str(), *len).map_err(invalid)?;
        dims.insert(name.clone());
    }

    for (key, value) in dataset.attrs() {
        let added = match value {
            AttrValue::Text(s) => ds.add_global_attr_string(key.as_str(), s.as_str()),
            AttrValue::Float(v) => ds.add_global_attr_f64(key.as_str(), vec![*v]),
        };
        added.map_err(invalid)?;
    }

    let mut payloads = Vec::new();
    for var in dataset.coords().iter().chain(dataset.data_vars()) {
        let mut var_dims: Vec<String> = var.dims.clone();
        let payload = match &var.values {
            Values::Float(v) => {
                ds.add_var_f64(var.name.as_str(), &dim_names(&var_dims)).map_err(invalid)?;
                Payload::Double(v.clone())
            }
            Values::Time(v) => {
                ds.add_var_f64(var.name.as_str(), &dim_names(&var_dims)).map_err(invalid)?;
                Payload::Double(v.iter().map(epoch_seconds).collect())
            }
            Values::Text(v) => {
                let width = v.iter().map(String::len).max().unwrap_or(0).max(1);
                let strlen = format!("string{width}");
                if dims.insert(strlen.clone()) {
                    ds.add_fixed_dim(strlen.as_str(), width).map_err(invalid)?;
                }
                var_dims.push(strlen);
                ds.add_var_u8(var.name.as_str(), &dim_names(&var_dims)).map_err(invalid)?;
                let mut chars = Vec::with_capacity(v.len() * width);
                for s in v {
                    chars.extend_from_slice(s.as_bytes());
                    chars.resize(chars.len() + width - s.len(), 0);
                }
                Payload::Char(chars)
            }
        };

        for (key, value) in encoded_attrs(var) {
            let added = match value {
                AttrValue::Text(s) => ds.add_var_attr_string(var.name.as_str(), key.as_str(), s.as_str()),
                AttrValue::Float(x) => ds.add_var_attr_f64(var.name.as_str(), key.as_str(), vec![x]),
            };
            added.map_err(invalid)?;
        }
        payloads.push((var.name.clone(), payload));
    }
    Ok((ds, payloads))
}

/// Writer backed by libnetcdf through the `netcdf` crate.
#[cfg(feature = "netcdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfWriter;

#[cfg(feature = "netcdf")]
impl DatasetWriter for NetcdfWriter {
    fn write(&self, dataset: &ObservationDataset, path: &Path) -> Result<()> {
        let nc = |e: netcdf::Error| persistence(path, e);

        let mut file = netcdf::create(path).map_err(nc)?;
        for (name, len) in dataset.dims() {
            file.add_dimension(name, *len).map_err(nc)?;
        }
        for (key, value) in dataset.attrs() {
            let added = match value {
                AttrValue::Text(s) => file.add_attribute(key, s.as_str()),
                AttrValue::Float(v) => file.add_attribute(key, *v),
            };
            added.map_err(nc)?;
        }

        for var in dataset.coords().iter().chain(dataset.data_vars()) {
            let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
            let mut v = match &var.values {
                Values::Text(_) => file.add_string_variable(&var.name, &dims).map_err(nc)?,
                Values::Float(_) | Values::Time(_) => {
                    file.add_variable::<f64>(&var.name, &dims).map_err(nc)?
                }
            };

            // _FillValue must be defined before any data is written.
            for (key, value) in encoded_attrs(var) {
                let put = match value {
                    AttrValue::Text(s) => v.put_attribute(&key, s.as_str()),
                    AttrValue::Float(x) => v.put_attribute(&key, x),
                };
                put.map_err(nc)?;
            }

            match &var.values {
                Values::Float(values) => v.put_values(values, ..).map_err(nc)?,
                Values::Time(times) => {
                    let secs: Vec<f64> = times.iter().map(epoch_seconds).collect();
                    v.put_values(&secs, ..).map_err(nc)?
                }
                Values::Text(values) => {
                    for (i, s) in values.iter().enumerate() {
                        v.put_string(s, [i]).map_err(nc)?;
                    }
                }
            }
        }
        debug!(path = %path.display(), "wrote netcdf file");
        Ok(())
    }
}
