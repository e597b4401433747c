use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::dataset::{AttrValue, Attributes, ObservationDataset, SITE_DIM, TIME_DIM, Values, Variable};
use crate::error::{Error, Result};
use crate::metadata::{SiteMetadata, SiteMetadataMap, VariableMetadataMap};
use crate::request::DataCategory;
use crate::reshape::TimeSeriesTable;
use crate::table::RowIndex;

/// Build the labeled dataset from a reshaped table and resolved metadata.
///
/// A time-indexed table gives `[datetime]` arrays with the site described by
/// global attributes. A (site, time) table gives `[site_no, datetime]` arrays
/// over the sorted union of timestamps, with per-site metadata stored as
/// auxiliary coordinates along `site_no`.
pub fn assemble(
    table: TimeSeriesTable,
    sites: &SiteMetadataMap,
    variables: &VariableMetadataMap,
    category: DataCategory,
) -> Result<ObservationDataset> {
    let mut ds = match table.index() {
        RowIndex::Time(times) => single_site(&table, times, sites),
        RowIndex::SiteTime(keys) => multi_site(&table, keys, sites),
    };

    for var in &mut ds.data_vars {
        let meta = variables.get(&var.name).ok_or_else(|| {
            Error::MetadataLookup(format!("no metadata resolved for variable {}", var.name))
        })?;
        var.attrs.insert("variable_name".into(), meta.name.as_str().into());
        var.attrs.insert("variable_unit".into(), meta.unit.as_str().into());
        var.attrs
            .insert("variable_data_type".into(), category.label().into());
    }

    Ok(ds)
}

fn single_site(
    table: &TimeSeriesTable,
    times: &[DateTime<Utc>],
    sites: &SiteMetadataMap,
) -> ObservationDataset {
    let data_vars = table
        .series()
        .iter()
        .map(|s| Variable::new(&s.code, &[TIME_DIM], Values::Float(s.values.clone())))
        .collect();

    ObservationDataset {
        dims: vec![(TIME_DIM.to_string(), times.len())],
        coords: vec![Variable::new(TIME_DIM, &[TIME_DIM], Values::Time(times.to_vec()))],
        data_vars,
        attrs: sites.values().next().map(site_attributes).unwrap_or_default(),
    }
}

fn site_attributes(site: &SiteMetadata) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("site_name".into(), site.name.as_str().into());
    attrs.insert("site_code".into(), site.code.as_str().into());
    let numbers = [
        ("site_latitude", site.latitude),
        ("site_longitude", site.longitude),
        ("site_altitude", site.altitude),
    ];
    for (key, value) in numbers {
        if let Some(v) = value {
            attrs.insert(key.into(), AttrValue::Float(v));
        }
    }
    if let Some(datum) = &site.coord_datum {
        attrs.insert("site_coord_datum".into(), datum.as_str().into());
    }
    attrs
}

fn multi_site(
    table: &TimeSeriesTable,
    keys: &[(String, DateTime<Utc>)],
    sites: &SiteMetadataMap,
) -> ObservationDataset {
    let site_axis: Vec<String> = keys
        .iter()
        .map(|(s, _)| s.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let time_axis: Vec<DateTime<Utc>> = keys
        .iter()
        .map(|(_, t)| *t)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let site_pos: BTreeMap<&str, usize> =
        site_axis.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();
    let time_pos: BTreeMap<DateTime<Utc>, usize> =
        time_axis.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let cells: Vec<usize> = keys
        .iter()
        .map(|(s, t)| site_pos[s.as_str()] * time_axis.len() + time_pos[t])
        .collect();

    let data_vars = table
        .series()
        .iter()
        .map(|s| {
            let mut grid = vec![f64::NAN; site_axis.len() * time_axis.len()];
            for (row, cell) in cells.iter().enumerate() {
                grid[*cell] = s.values[row];
            }
            Variable::new(&s.code, &[SITE_DIM, TIME_DIM], Values::Float(grid))
        })
        .collect();

    let lookup = |f: fn(&SiteMetadata) -> Option<f64>| -> Values {
        Values::Float(
            site_axis
                .iter()
                .map(|s| sites.get(s).and_then(f).unwrap_or(f64::NAN))
                .collect(),
        )
    };
    let text = |f: fn(&SiteMetadata) -> Option<String>| -> Values {
        Values::Text(
            site_axis
                .iter()
                .map(|s| sites.get(s).and_then(f).unwrap_or_default())
                .collect(),
        )
    };

    let coords = vec![
        Variable::new(SITE_DIM, &[SITE_DIM], Values::Text(site_axis.clone())),
        Variable::new(TIME_DIM, &[TIME_DIM], Values::Time(time_axis.clone())),
        Variable::new("site_name", &[SITE_DIM], text(|m| Some(m.name.clone()))),
        Variable::new("site_latitude", &[SITE_DIM], lookup(|m| m.latitude)),
        Variable::new("site_longitude", &[SITE_DIM], lookup(|m| m.longitude)),
        Variable::new("site_altitude", &[SITE_DIM], lookup(|m| m.altitude)),
        Variable::new("site_coord_datum", &[SITE_DIM], text(|m| m.coord_datum.clone())),
    ];

    ObservationDataset {
        dims: vec![
            (SITE_DIM.to_string(), site_axis.len()),
            (TIME_DIM.to_string(), time_axis.len()),
        ],
        coords,
        data_vars,
        attrs: Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{VariableMetadata, builtin_variable};
    use crate::reshape::reshape;
    use crate::table::ObservationTable;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, h, 0, 0).unwrap()
    }

    fn site(code: &str, name: &str, lat: f64) -> SiteMetadata {
        SiteMetadata {
            code: code.into(),
            name: name.into(),
            latitude: Some(lat),
            longitude: Some(-87.6),
            altitude: None,
            coord_datum: Some("NAD83".into()),
        }
    }

    fn discharge() -> VariableMetadataMap {
        VariableMetadataMap::from([("00060".to_string(), builtin_variable("00060").unwrap())])
    }

    #[test]
    fn single_site_round_trip() {
        let raw = ObservationTable::new(RowIndex::Time(vec![t(0), t(1), t(2)]))
            .with_numbers("00060", &[1.0, 2.0, 3.0]);
        let sites = SiteMetadataMap::from([(
            "03339000".to_string(),
            site("03339000", "VERMILION RIVER NEAR DANVILLE, IL", 40.1),
        )]);

        let ds = assemble(reshape(raw, &[]).unwrap(), &sites, &discharge(), DataCategory::Instantaneous)
            .unwrap();

        assert_eq!(ds.data_var_names().collect::<Vec<_>>(), vec!["00060"]);
        assert_eq!(ds.times().len(), 3);
        let q = ds.data_var("00060").unwrap();
        assert_eq!(q.dims, vec![TIME_DIM.to_string()]);
        assert_eq!(q.attr("variable_name").and_then(AttrValue::as_text), Some("discharge"));
        assert_eq!(
            q.attr("variable_unit").and_then(AttrValue::as_text),
            Some("cubic feet per second")
        );
        assert_eq!(
            q.attr("variable_data_type").and_then(AttrValue::as_text),
            Some("instantaneous value")
        );
        assert_eq!(
            ds.attr("site_name").and_then(AttrValue::as_text),
            Some("VERMILION RIVER NEAR DANVILLE, IL")
        );
        assert_eq!(ds.attr("site_code").and_then(AttrValue::as_text), Some("03339000"));
        assert_eq!(ds.attr("site_latitude").and_then(AttrValue::as_float), Some(40.1));
        assert!(ds.attr("site_altitude").is_none());
    }

    #[test]
    fn daily_category_labels_variables() {
        let raw = ObservationTable::new(RowIndex::Time(vec![t(0)])).with_numbers("00060_Mean", &[5.0]);
        let ds = assemble(
            reshape(raw, &[]).unwrap(),
            &SiteMetadataMap::new(),
            &discharge(),
            DataCategory::Daily,
        )
        .unwrap();
        let q = ds.data_var("00060").unwrap();
        assert_eq!(
            q.attr("variable_data_type").and_then(AttrValue::as_text),
            Some("daily value")
        );
    }

    #[test]
    fn multi_site_grid_keeps_per_site_metadata() {
        let keys = vec![
            ("03339000".to_string(), t(1)),
            ("03339000".to_string(), t(2)),
            ("01542500".to_string(), t(0)),
            ("01542500".to_string(), t(2)),
        ];
        let raw = ObservationTable::new(RowIndex::SiteTime(keys))
            .with_numbers("00060", &[10.0, 20.0, 30.0, 40.0]);
        let sites = SiteMetadataMap::from([
            ("03339000".to_string(), site("03339000", "VERMILION", 40.1)),
            ("01542500".to_string(), site("01542500", "WB SUSQUEHANNA", 41.2)),
        ]);

        let ds = assemble(reshape(raw, &[]).unwrap(), &sites, &discharge(), DataCategory::Instantaneous)
            .unwrap();

        assert!(ds.is_multi_site());
        assert_eq!(ds.sites(), ["01542500".to_string(), "03339000".to_string()]);
        assert_eq!(ds.times(), [t(0), t(1), t(2)]);

        let q = ds.data_var("00060").unwrap().values.as_float().unwrap();
        assert_eq!(q[0], 30.0);
        assert!(q[1].is_nan());
        assert_eq!(q[2], 40.0);
        assert!(q[3].is_nan());
        assert_eq!(q[4], 10.0);
        assert_eq!(q[5], 20.0);

        let names = ds.coord("site_name").unwrap().values.as_text().unwrap();
        assert_eq!(names, ["WB SUSQUEHANNA".to_string(), "VERMILION".to_string()]);
        let lats = ds.coord("site_latitude").unwrap().values.as_float().unwrap();
        assert_eq!(lats, [41.2, 40.1]);
        assert!(ds.attr("site_name").is_none());
    }

    #[test]
    fn missing_variable_metadata_is_reported() {
        let raw = ObservationTable::new(RowIndex::Time(vec![t(0)])).with_numbers("63680", &[1.0]);
        let vars = VariableMetadataMap::from([(
            "00060".to_string(),
            VariableMetadata { name: "discharge".into(), unit: "cfs".into() },
        )]);
        let err = assemble(
            reshape(raw, &[]).unwrap(),
            &SiteMetadataMap::new(),
            &vars,
            DataCategory::Instantaneous,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MetadataLookup(_)));
    }
}
