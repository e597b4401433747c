use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::rdb::{self, RdbTable};
use crate::service::NwisSource;

/// Display name and unit of a parameter code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableMetadata {
    pub name: String,
    pub unit: String,
}

/// Station description from the site service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMetadata {
    pub code: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub coord_datum: Option<String>,
}

pub type VariableMetadataMap = BTreeMap<String, VariableMetadata>;
pub type SiteMetadataMap = BTreeMap<String, SiteMetadata>;

/// Names and units for common codes, consulted before the remote lookup.
pub const BUILTIN_VARIABLES: [(&str, &str, &str); 6] = [
    ("00060", "discharge", "cubic feet per second"),
    ("00065", "gage height", "feet"),
    ("00010", "water temperature", "degree celsius"),
    ("80154", "Suspended sediment discharge", "tons per day"),
    ("80155", "Total sediment discharge", "tons per day"),
    ("80225", "Bedload sediment discharge", "tons per day"),
];

const NAME_COLUMNS: [&str; 2] = ["SRSName", "srsname"];
const FALLBACK_NAME_COLUMNS: [&str; 2] = ["parm_nm", "parameter_nm"];
const UNIT_COLUMNS: [&str; 2] = ["parm_unit", "parameter_units"];
const CODE_COLUMNS: [&str; 2] = ["parameter_cd", "parm_cd"];

pub fn builtin_variable(code: &str) -> Option<VariableMetadata> {
    BUILTIN_VARIABLES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, name, unit)| VariableMetadata {
            name: name.to_string(),
            unit: unit.to_string(),
        })
}

/// Variable metadata resolved during one retrieval. Create a fresh cache per
/// call; nothing is shared between calls.
#[derive(Debug, Default)]
pub struct LookupCache {
    variables: HashMap<String, VariableMetadata>,
    remote_queries: usize,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameter lookups this cache has sent to the service.
    pub fn remote_queries(&self) -> usize {
        self.remote_queries
    }

    pub fn get(&self, code: &str) -> Option<&VariableMetadata> {
        self.variables.get(code)
    }
}

/// Resolve names and units for `codes`.
///
/// With `builtin` set the fixed table answers first; other codes go to the
/// parameter lookup once per cache. Any lookup or parse failure aborts.
pub fn resolve_variables<S>(
    source: &S,
    codes: &[String],
    cache: &mut LookupCache,
    builtin: bool,
) -> Result<VariableMetadataMap>
where
    S: NwisSource + ?Sized,
{
    let mut out = VariableMetadataMap::new();
    for code in codes {
        if let Some(meta) = cache.variables.get(code) {
            out.insert(code.clone(), meta.clone());
            continue;
        }

        let meta = match builtin.then(|| builtin_variable(code)).flatten() {
            Some(meta) => meta,
            None => {
                debug!(code = %code, "querying parameter metadata");
                cache.remote_queries += 1;
                let text = source
                    .parameter_info(code)
                    .map_err(|e| Error::MetadataLookup(format!("parameter {code}: {e}")))?;
                parse_parameter_info(code, &text)?
            }
        };
        cache.variables.insert(code.clone(), meta.clone());
        out.insert(code.clone(), meta);
    }
    Ok(out)
}

/// Extract name and unit from a parameter-code RDB payload.
///
/// The name is the first comma-separated token of the SRS name, falling back
/// to the parameter name when the SRS name is blank.
pub fn parse_parameter_info(code: &str, text: &str) -> Result<VariableMetadata> {
    let table = rdb::parse(text)
        .map_err(|e| Error::MetadataLookup(format!("parameter {code}: {e}")))?;
    if table.is_empty() {
        return Err(Error::MetadataLookup(format!(
            "parameter {code}: lookup returned no rows"
        )));
    }

    let row = table
        .find_column(&CODE_COLUMNS)
        .and_then(|idx| table.rows.iter().position(|r| r[idx].trim() == code))
        .unwrap_or(0);

    let field = |names: &[&str]| -> Option<String> {
        let idx = table.find_column(names)?;
        let value = table.rows[row][idx].trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    let name = field(&NAME_COLUMNS)
        .or_else(|| field(&FALLBACK_NAME_COLUMNS))
        .map(|n| n.split(',').next().unwrap_or_default().trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            Error::MetadataLookup(format!("parameter {code}: response has no name field"))
        })?;
    let unit = field(&UNIT_COLUMNS).ok_or_else(|| {
        Error::MetadataLookup(format!("parameter {code}: response has no unit field"))
    })?;

    Ok(VariableMetadata { name, unit })
}

/// True when two site numbers name the same site. The service pads numbers
/// with leading zeros, so `3339000` and `03339000` match.
pub(crate) fn same_site(a: &str, b: &str) -> bool {
    a.trim().trim_start_matches('0') == b.trim().trim_start_matches('0')
}

/// Look up every site in one site-service call. The first row returned for a
/// site wins; a requested site missing from the response is an error. The map
/// is keyed by the `site_no` the service returns.
pub fn resolve_sites<S>(source: &S, sites: &[String]) -> Result<SiteMetadataMap>
where
    S: NwisSource + ?Sized,
{
    let table = source
        .site_records(sites)
        .map_err(|e| Error::MetadataLookup(format!("site lookup: {e}")))?;
    let found = site_metadata_from_rdb(&table)?;

    let mut out = SiteMetadataMap::new();
    for site in sites {
        let site = site.trim();
        let meta = found
            .get(site)
            .or_else(|| found.values().find(|m| same_site(&m.code, site)))
            .ok_or_else(|| {
                Error::MetadataLookup(format!("site {site} missing from site service response"))
            })?;
        out.insert(meta.code.clone(), meta.clone());
    }
    info!(sites = out.len(), "resolved site metadata");
    Ok(out)
}

/// Convert site-service rows into metadata, keeping the first row per site.
pub fn site_metadata_from_rdb(table: &RdbTable) -> Result<SiteMetadataMap> {
    if table.column_index("site_no").is_none() && !table.is_empty() {
        return Err(Error::MetadataLookup(
            "site service response has no site_no column".into(),
        ));
    }

    let number = |row: usize, col: &str| -> Option<f64> {
        table.cell(row, col).and_then(|v| v.parse::<f64>().ok())
    };

    let mut out = SiteMetadataMap::new();
    for row in 0..table.rows.len() {
        let Some(code) = table.cell(row, "site_no") else {
            continue;
        };
        if out.contains_key(code) {
            continue;
        }
        out.insert(
            code.to_string(),
            SiteMetadata {
                code: code.to_string(),
                name: table.cell(row, "station_nm").unwrap_or_default().to_string(),
                latitude: number(row, "dec_lat_va"),
                longitude: number(row, "dec_long_va"),
                altitude: number(row, "alt_va"),
                coord_datum: table.cell(row, "dec_coord_datum_cd").map(str::to_string),
            },
        );
    }
    Ok(out)
}
