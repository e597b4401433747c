use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::client::ClientOptions;
use crate::date::{DateRange, parse_service_datetime};
use crate::error::{Error, Result};
use crate::rdb::{self, RdbTable};
use crate::request::DataCategory;
use crate::table::{ColumnData, ObservationTable, RowIndex};

/// The remote hydrological service, as the retrieval pipeline sees it.
pub trait NwisSource {
    /// One row per station from the site service. Unknown sites yield no row.
    fn site_records(&self, sites: &[String]) -> Result<RdbTable>;

    /// Observation table for the sites and dates. An empty table means the
    /// service had nothing for the request.
    fn observations(
        &self,
        sites: &[String],
        range: &DateRange,
        category: DataCategory,
        parameter_codes: &[String],
    ) -> Result<ObservationTable>;

    /// Raw RDB payload of the parameter-code lookup for `code`.
    fn parameter_info(&self, code: &str) -> Result<String>;
}

/// [`NwisSource`] backed by the USGS water services over blocking HTTP.
#[derive(Debug, Clone)]
pub struct WaterServices {
    http: HttpClient,
    service_url: Url,
    parameter_url: Url,
}

impl WaterServices {
    pub fn new(opts: &ClientOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&opts.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("nwis-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .timeout(opts.timeout);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            service_url: Url::parse(opts.service_url.trim_end_matches('/'))?,
            parameter_url: Url::parse(&opts.parameter_url)?,
        })
    }

    fn endpoint(&self, service: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}/{service}/", self.service_url.as_str().trim_end_matches('/')))?)
    }

    pub fn site_url(&self, sites: &[String]) -> Result<Url> {
        let mut url = self.endpoint("site")?;
        url.query_pairs_mut()
            .append_pair("format", "rdb")
            .append_pair("sites", &sites.join(","))
            .append_pair("siteStatus", "all");
        Ok(url)
    }

    pub fn data_url(
        &self,
        sites: &[String],
        range: &DateRange,
        category: DataCategory,
        parameter_codes: &[String],
    ) -> Result<Url> {
        let mut url = self.endpoint(category.code())?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("format", "rdb")
                .append_pair("sites", &sites.join(","))
                .append_pair("startDT", &range.start().format("%Y-%m-%d").to_string())
                .append_pair("endDT", &range.end().format("%Y-%m-%d").to_string())
                .append_pair("siteStatus", "all");
            if !parameter_codes.is_empty() {
                q.append_pair("parameterCd", &parameter_codes.join(","));
            }
        }
        Ok(url)
    }

    pub fn parameter_url(&self, code: &str) -> Url {
        let mut url = self.parameter_url.clone();
        url.query_pairs_mut()
            .append_pair("parm_nm_cd", code)
            .append_pair("fmt", "rdb");
        url
    }

    /// GET a text payload; 404 is how the services say "nothing matched".
    fn get_text(&self, url: Url) -> Result<Option<String>> {
        debug!(url = %url, "GET");
        let resp = self.http.get(url.clone()).send()?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Service {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Some(resp.text()?))
    }
}

impl NwisSource for WaterServices {
    fn site_records(&self, sites: &[String]) -> Result<RdbTable> {
        match self.get_text(self.site_url(sites)?)? {
            Some(text) => rdb::parse(&text),
            None => Ok(RdbTable::default()),
        }
    }

    fn observations(
        &self,
        sites: &[String],
        range: &DateRange,
        category: DataCategory,
        parameter_codes: &[String],
    ) -> Result<ObservationTable> {
        let url = self.data_url(sites, range, category, parameter_codes)?;
        match self.get_text(url)? {
            Some(text) => observation_table(&text, sites.len() > 1),
            None => Ok(ObservationTable::empty()),
        }
    }

    fn parameter_info(&self, code: &str) -> Result<String> {
        let url = self.parameter_url(code);
        self.get_text(url.clone())?.ok_or_else(|| Error::Service {
            status: StatusCode::NOT_FOUND.as_u16(),
            url: url.to_string(),
        })
    }
}

const INDEX_COLUMNS: [&str; 4] = ["agency_cd", "site_no", "datetime", "tz_cd"];

/// Statistic codes the daily service appends to value columns.
const STATISTIC_SUFFIXES: [(&str, &str); 4] = [
    ("00003", "_Mean"),
    ("00001", "_Max"),
    ("00002", "_Min"),
    ("00006", "_Sum"),
];

/// Convert an `iv`/`dv` RDB payload into an observation table.
///
/// Columns named `<ts_id>_<param>[_<stat>][_cd]` are renamed to
/// `<param>[_<method>][_<Stat>][_cd]`, where the method tag comes from a
/// bracketed label in the time-series description. Blocks for several sites
/// are merged; `multi_site` selects a (site, datetime) row index.
pub fn observation_table(text: &str, multi_site: bool) -> Result<ObservationTable> {
    let mut builder = TableBuilder::default();

    for block in rdb::parse_blocks(text)? {
        let descriptions = series_descriptions(&block.comments);
        let datetime_idx = block
            .column_index("datetime")
            .ok_or_else(|| Error::Parse("observation block has no datetime column".into()))?;
        let site_idx = block.column_index("site_no");
        let tz_idx = block.column_index("tz_cd");

        let mut names = ColumnNamer::new(&descriptions);
        let value_columns: Vec<(usize, String, bool)> = block
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !INDEX_COLUMNS.contains(&c.as_str()))
            .map(|(i, c)| {
                let numeric = block.types.get(i).is_some_and(|t| t.ends_with('n'));
                (i, names.rename(c), numeric)
            })
            .collect();

        for row in &block.rows {
            let stamp = row[datetime_idx].trim();
            if stamp.is_empty() {
                continue;
            }
            let time = parse_service_datetime(stamp, tz_idx.map(|i| row[i].as_str()))?;
            let site = site_idx.map(|i| row[i].trim().to_string()).unwrap_or_default();
            let cells = value_columns
                .iter()
                .map(|(i, name, numeric)| (name.as_str(), *numeric, row[*i].trim()));
            builder.push_row(site, time, cells);
        }
    }

    Ok(builder.finish(multi_site))
}

/// `ts_id -> description` from the comment block preceding the header, e.g.
/// `#        69928       00060     Discharge, cubic feet per second`.
fn series_descriptions(comments: &[String]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in comments {
        let body = line.trim_start_matches('#').trim();
        let mut tokens = body.split_whitespace();
        let (Some(ts), Some(param)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if !is_code(ts) || !is_code(param) || param.len() != 5 {
            continue;
        }
        let rest: Vec<&str> = tokens.collect();
        let rest = match rest.first() {
            Some(stat) if stat.len() == 5 && is_code(stat) => &rest[1..],
            _ => &rest[..],
        };
        out.insert(ts.to_string(), rest.join(" "));
    }
    out
}

fn is_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Lower-cased bracket label from a description, `[Hach]` -> `hach`.
fn method_tag(description: &str) -> Option<String> {
    let open = description.rfind('[')?;
    let close = description[open..].find(']')? + open;
    let tag: String = description[open + 1..close]
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let tag = tag.trim_matches('_').to_string();
    (!tag.is_empty()).then_some(tag)
}

struct ColumnNamer<'a> {
    descriptions: &'a HashMap<String, String>,
    by_series: HashMap<(String, String, String), String>,
}

impl<'a> ColumnNamer<'a> {
    fn new(descriptions: &'a HashMap<String, String>) -> Self {
        Self {
            descriptions,
            by_series: HashMap::new(),
        }
    }

    fn rename(&mut self, raw: &str) -> String {
        let parts: Vec<&str> = raw.split('_').collect();
        if parts.len() < 2 || !is_code(parts[0]) || !is_code(parts[1]) || parts[1].len() != 5 {
            return raw.to_string();
        }
        let (ts, param) = (parts[0], parts[1]);
        let mut rest = &parts[2..];
        let stat = match rest.first() {
            Some(s) if is_code(s) && s.len() == 5 => {
                rest = &rest[1..];
                s.to_string()
            }
            _ => String::new(),
        };
        let qualifier = rest == ["cd"];

        let key = (ts.to_string(), param.to_string(), stat.clone());
        let base = match self.by_series.get(&key) {
            Some(base) => base.clone(),
            None => {
                let mut base = param.to_string();
                if let Some(tag) = self.descriptions.get(ts).and_then(|d| method_tag(d)) {
                    base.push('_');
                    base.push_str(&tag);
                }
                if !stat.is_empty() {
                    let suffix = STATISTIC_SUFFIXES
                        .iter()
                        .find(|(code, _)| *code == stat)
                        .map(|(_, s)| s.to_string())
                        .unwrap_or_else(|| format!("_{stat}"));
                    base.push_str(&suffix);
                }
                if self.by_series.values().any(|b| *b == base) {
                    base = format!("{base}_{ts}");
                }
                self.by_series.insert(key, base.clone());
                base
            }
        };

        if qualifier {
            format!("{base}_cd")
        } else if rest.is_empty() {
            base
        } else {
            format!("{base}_{}", rest.join("_"))
        }
    }
}

#[derive(Default)]
struct TableBuilder {
    keys: Vec<(String, DateTime<Utc>)>,
    columns: Vec<(String, bool, Vec<Option<String>>)>,
}

impl TableBuilder {
    fn push_row<'c>(
        &mut self,
        site: String,
        time: DateTime<Utc>,
        cells: impl Iterator<Item = (&'c str, bool, &'c str)>,
    ) {
        let row = self.keys.len();
        self.keys.push((site, time));
        for (name, numeric, value) in cells {
            let idx = match self.columns.iter().position(|(n, _, _)| n == name) {
                Some(idx) => idx,
                None => {
                    self.columns.push((name.to_string(), numeric, vec![None; row]));
                    self.columns.len() - 1
                }
            };
            let column = &mut self.columns[idx].2;
            column.resize(row, None);
            column.push((!value.is_empty()).then(|| value.to_string()));
        }
    }

    fn finish(self, multi_site: bool) -> ObservationTable {
        let n = self.keys.len();
        let index = if multi_site {
            RowIndex::SiteTime(self.keys)
        } else {
            RowIndex::Time(self.keys.into_iter().map(|(_, t)| t).collect())
        };

        let mut table = ObservationTable::new(index);
        for (name, numeric, mut cells) in self.columns {
            cells.resize(n, None);
            let data = if numeric {
                ColumnData::Number(
                    cells
                        .into_iter()
                        .map(|c| c.and_then(|v| v.parse::<f64>().ok()))
                        .collect(),
                )
            } else {
                ColumnData::Text(cells)
            };
            table.push_column(name, data);
        }
        table
    }
}
