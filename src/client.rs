use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::assemble::assemble;
use crate::dataset::ObservationDataset;
use crate::date::DateRange;
use crate::error::{Error, Result};
use crate::metadata::{
    LookupCache, SiteMetadataMap, VariableMetadataMap, resolve_sites, resolve_variables, same_site,
};
use crate::persist::{ClassicWriter, DatasetWriter};
use crate::request::{DataCategory, Request};
use crate::reshape::reshape;
use crate::service::{NwisSource, WaterServices};

pub const DEFAULT_SERVICE_URL: &str = "https://waterservices.usgs.gov/nwis";
pub const DEFAULT_PARAMETER_URL: &str = "https://help.waterdata.usgs.gov/code/parameter_cd_nm_query";
pub const REQUIRED_EXTENSION: &str = "nc";

/// What to do when writing the output file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistFailure {
    /// Log a warning and still return the dataset.
    #[default]
    Warn,
    /// Return the [`Error::Persistence`] to the caller.
    Abort,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub service_url: String,
    pub parameter_url: String,
    pub timeout: Option<Duration>,
    pub verify_tls: bool,
    pub user_agent: String,
    /// Answer common parameter codes from the built-in table.
    pub builtin_variables: bool,
    pub persist_failure: PersistFailure,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            parameter_url: DEFAULT_PARAMETER_URL.to_string(),
            timeout: Some(Duration::from_secs(60)),
            verify_tls: true,
            user_agent: concat!("nwis-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            builtin_variables: true,
            persist_failure: PersistFailure::Warn,
        }
    }
}

impl ClientOptions {
    /// Defaults overridden by `NWIS_SERVICE_URL`, `NWIS_PARAMETER_URL` and
    /// `NWIS_TIMEOUT_SECS` (`0` disables the timeout).
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("NWIS_SERVICE_URL").filter(|v| !v.trim().is_empty()) {
            self.service_url = url.trim().to_string();
        }
        if let Some(url) = var("NWIS_PARAMETER_URL").filter(|v| !v.trim().is_empty()) {
            self.parameter_url = url.trim().to_string();
        }
        if let Some(raw) = var("NWIS_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.timeout = None,
                Ok(secs) => self.timeout = Some(Duration::from_secs(secs)),
                Err(_) => warn!(value = %raw, "ignoring unparsable NWIS_TIMEOUT_SECS"),
            }
        }
        self
    }
}

/// A request whose every field has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub sites: Vec<String>,
    pub range: DateRange,
    pub category: DataCategory,
    pub parameter_codes: Vec<String>,
    pub output: Option<PathBuf>,
}

/// Check a request before anything is fetched.
///
/// Dates, category and output path are checked locally first. Each site is
/// then looked up in the site service; an empty answer or a failed lookup
/// rejects it with [`Error::InvalidSite`]. Accepted sites are recorded under
/// the `site_no` the service returns, so `3339000` becomes `03339000`.
pub fn validate<S>(source: &S, request: &Request) -> Result<ValidatedRequest>
where
    S: NwisSource + ?Sized,
{
    let range = DateRange::parse(&request.start, &request.end)?;
    let category: DataCategory = request.category.parse()?;
    if let Some(path) = &request.output {
        check_output_path(path)?;
    }

    let sites: Vec<String> = request.sites().iter().map(|s| s.trim().to_string()).collect();
    if sites.is_empty() {
        return Err(Error::InvalidSite("no site given".into()));
    }
    for site in &sites {
        if site.is_empty() || !site.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidSite(site.clone()));
        }
    }
    let mut canonical: Vec<String> = Vec::with_capacity(sites.len());
    for site in &sites {
        let table = match source.site_records(std::slice::from_ref(site)) {
            Ok(table) if !table.is_empty() => table,
            Ok(_) => return Err(Error::InvalidSite(site.clone())),
            Err(e) => {
                debug!(site = %site, error = %e, "site lookup failed");
                return Err(Error::InvalidSite(site.clone()));
            }
        };
        let code = (0..table.rows.len())
            .filter_map(|row| table.cell(row, "site_no"))
            .find(|code| same_site(code, site))
            .unwrap_or(site.as_str())
            .to_string();
        debug!(site = %site, site_no = %code, "site exists");
        if !canonical.contains(&code) {
            canonical.push(code);
        }
    }

    Ok(ValidatedRequest {
        sites: canonical,
        range,
        category,
        parameter_codes: request.parameter_codes.clone(),
        output: request.output.clone(),
    })
}

fn check_output_path(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == REQUIRED_EXTENSION => Ok(()),
        _ => Err(Error::InvalidOutputPath(path.to_path_buf())),
    }
}

/// Dataset plus the metadata it was assembled from.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub dataset: ObservationDataset,
    pub sites: SiteMetadataMap,
    pub variables: VariableMetadataMap,
}

pub struct Client<S = WaterServices> {
    source: S,
    opts: ClientOptions,
    writer: Box<dyn DatasetWriter>,
}

impl Client<WaterServices> {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let source = WaterServices::new(&opts)?;
        Ok(Self::with_source(source, opts))
    }

    /// Client for the public USGS services with environment overrides applied.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientOptions::from_env())
    }
}

impl<S: NwisSource> Client<S> {
    pub fn with_source(source: S, opts: ClientOptions) -> Self {
        Self {
            source,
            opts,
            writer: Box::new(ClassicWriter),
        }
    }

    pub fn with_writer(mut self, writer: impl DatasetWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &ClientOptions {
        &self.opts
    }

    pub fn get_data(&self, request: &Request) -> Result<ObservationDataset> {
        self.retrieve(request).map(|r| r.dataset)
    }

    /// Validate, fetch once, reshape, resolve metadata, assemble, and write
    /// the file when the request names one.
    pub fn retrieve(&self, request: &Request) -> Result<Retrieval> {
        let req = validate(&self.source, request)?;
        info!(
            sites = %req.sites.join(","),
            start = %req.range.start(),
            end = %req.range.end(),
            category = %req.category,
            "retrieving observations"
        );

        let raw = self
            .source
            .observations(&req.sites, &req.range, req.category, &req.parameter_codes)?;
        let table = reshape(raw, &req.parameter_codes)?;
        info!(rows = table.n_rows(), variables = table.series().len(), "reshaped observations");

        let sites = resolve_sites(&self.source, &req.sites)?;
        let codes: Vec<String> = table.codes().map(str::to_string).collect();
        let mut cache = LookupCache::new();
        let variables =
            resolve_variables(&self.source, &codes, &mut cache, self.opts.builtin_variables)?;

        let dataset = assemble(table, &sites, &variables, req.category)?;

        if let Some(path) = &req.output {
            self.persist(&dataset, path)?;
        }

        Ok(Retrieval {
            dataset,
            sites,
            variables,
        })
    }

    fn persist(&self, dataset: &ObservationDataset, path: &Path) -> Result<()> {
        match self.writer.write(dataset, path) {
            Ok(()) => {
                info!(path = %path.display(), "dataset written");
                Ok(())
            }
            Err(e) => match self.opts.persist_failure {
                PersistFailure::Warn => {
                    warn!(path = %path.display(), error = %e, "failed to write dataset");
                    Ok(())
                }
                PersistFailure::Abort => Err(e),
            },
        }
    }
}

/// Retrieve with a default client; see [`Client::get_data`].
pub fn get_data(request: &Request) -> Result<ObservationDataset> {
    Client::default_client()?.get_data(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AttrValue;
    use crate::table::{ObservationTable, RowIndex};
    use crate::testing::FakeSource;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    const SITE: &str = "03339000";

    fn source() -> FakeSource {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let times = (0..3).map(|i| t0 + chrono::Duration::minutes(15 * i)).collect();
        FakeSource::new()
            .with_site(SITE, "VERMILION RIVER NEAR DANVILLE, IL")
            .with_table(
                ObservationTable::new(RowIndex::Time(times)).with_numbers("00060", &[1.0, 2.0, 3.0]),
            )
    }

    fn request() -> Request {
        Request::new(SITE).start("2020-01-01").end("2020-01-02")
    }

    struct FailingWriter;

    impl DatasetWriter for FailingWriter {
        fn write(&self, _dataset: &ObservationDataset, path: &Path) -> Result<()> {
            Err(Error::Persistence {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            })
        }
    }

    #[test]
    fn valid_request_passes() {
        let src = source();
        let v = validate(&src, &request().category("dv").output("out.nc")).unwrap();
        assert_eq!(v.sites, vec![SITE.to_string()]);
        assert_eq!(v.category, DataCategory::Daily);
        assert_eq!(v.output, Some(PathBuf::from("out.nc")));
        assert_eq!(src.site_calls(), 1);
    }

    #[test]
    fn unpadded_site_is_recorded_as_returned() {
        let src = source();
        let req = Request::new(["3339000", "03339000"]).start("2020-01-01").end("2020-01-02");
        let v = validate(&src, &req).unwrap();
        assert_eq!(v.sites, vec![SITE.to_string()]);

        let client = Client::with_source(source(), ClientOptions::default());
        let r = client.retrieve(&Request::new("3339000").start("2020-01-01").end("2020-01-02")).unwrap();
        assert_eq!(r.dataset.attr("site_code").and_then(AttrValue::as_text), Some(SITE));
        assert_eq!(r.sites[SITE].name, "VERMILION RIVER NEAR DANVILLE, IL");
    }

    #[test]
    fn unknown_or_malformed_sites_are_rejected() {
        let src = source();
        for bad in ["0333900", "99999999", "", "03339 000", "0333-9000"] {
            let err = validate(&src, &Request::new(bad).start("2020-01-01").end("2020-01-02"))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidSite(_)), "{bad}: {err}");
        }
        let err = validate(&source().failing_sites(), &request()).unwrap_err();
        assert!(matches!(err, Error::InvalidSite(_)));
    }

    #[test]
    fn local_checks_run_before_site_lookups() {
        let src = source();
        let cases = [
            (request().start("2020/01/01"), "format"),
            (request().start("2020-01-03"), "order"),
            (request().category("hourly"), "category"),
            (request().output("out.csv"), "path"),
            (request().output("out"), "path"),
        ];
        for (req, kind) in cases {
            let err = validate(&src, &req).unwrap_err();
            let ok = match kind {
                "format" => matches!(err, Error::InvalidDateFormat(_)),
                "order" => matches!(err, Error::InvalidDateOrder { .. }),
                "category" => matches!(err, Error::InvalidCategory(_)),
                _ => matches!(err, Error::InvalidOutputPath(_)),
            };
            assert!(ok, "{kind}: {err}");
            assert!(err.is_validation());
        }
        assert_eq!(src.site_calls(), 0);
    }

    #[test]
    fn validation_failure_skips_the_fetch() {
        let client = Client::with_source(source(), ClientOptions::default());
        assert!(client.get_data(&request().category("xx")).is_err());
        assert_eq!(client.source().observation_calls(), 0);
    }

    #[test]
    fn pipeline_fetches_once_and_labels_variables() {
        let client = Client::with_source(source(), ClientOptions::default());
        let r = client.retrieve(&request()).unwrap();
        assert_eq!(client.source().observation_calls(), 1);
        assert_eq!(r.dataset.times().len(), 3);
        assert_eq!(
            r.dataset.attr("site_name").and_then(AttrValue::as_text),
            Some("VERMILION RIVER NEAR DANVILLE, IL")
        );
        assert_eq!(r.variables["00060"].name, "discharge");
        assert_eq!(r.sites[SITE].latitude, Some(40.1));
    }

    #[test]
    fn empty_fetch_is_no_data() {
        let src = FakeSource::new().with_site(SITE, "VERMILION");
        let client = Client::with_source(src, ClientOptions::default());
        let err = client.get_data(&request()).unwrap_err();
        assert!(matches!(err, Error::NoDataAvailable(_)));
    }

    #[test]
    fn persistence_failure_follows_policy() {
        let warn = Client::with_source(source(), ClientOptions::default()).with_writer(FailingWriter);
        assert!(warn.get_data(&request().output("out.nc")).is_ok());

        let opts = ClientOptions {
            persist_failure: PersistFailure::Abort,
            ..ClientOptions::default()
        };
        let abort = Client::with_source(source(), opts).with_writer(FailingWriter);
        let err = abort.get_data(&request().output("out.nc")).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NWIS_SERVICE_URL", "http://localhost:8080/nwis"),
            ("NWIS_TIMEOUT_SECS", "5"),
        ]);
        let opts = ClientOptions::default().with_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(opts.service_url, "http://localhost:8080/nwis");
        assert_eq!(opts.parameter_url, DEFAULT_PARAMETER_URL);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));

        let opts = ClientOptions::default().with_env(|k| (k == "NWIS_TIMEOUT_SECS").then(|| "0".into()));
        assert_eq!(opts.timeout, None);
        let opts = ClientOptions::default().with_env(|k| (k == "NWIS_TIMEOUT_SECS").then(|| "soon".into()));
        assert_eq!(opts.timeout, Some(Duration::from_secs(60)));
    }
}
