use std::path::PathBuf;

use clap::Parser;
use nwis::Request;

/// Retrieve USGS NWIS time series and save them as NetCDF.
#[derive(Parser)]
#[command(name = "nwis", version, about = "Download USGS NWIS data to a NetCDF file")]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// USGS site number.
    #[arg(long)]
    pub site: String,

    /// Start date of the time series as YYYY-MM-DD.
    #[arg(long = "start_date")]
    pub start_date: String,

    /// End date of the time series as YYYY-MM-DD.
    #[arg(long = "end_date")]
    pub end_date: String,

    /// Daily value ('dv') or instantaneous value ('iv').
    #[arg(long = "data_type", default_value = "iv")]
    pub data_type: String,

    /// Only fetch these parameter codes (repeatable).
    #[arg(long = "parameter_cd")]
    pub parameter_cd: Vec<String>,

    /// Print resolved site and variable metadata as JSON.
    #[arg(long)]
    pub print_metadata: bool,

    /// Output NetCDF file (.nc).
    pub output: PathBuf,
}

impl Cli {
    pub fn request(&self) -> Request {
        Request::new(self.site.as_str())
            .start(&self.start_date)
            .end(&self.end_date)
            .category(&self.data_type)
            .parameter_codes(self.parameter_cd.iter().cloned())
            .output(&self.output)
    }
}
