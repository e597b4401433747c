mod cli;
mod logging;

use std::process;

use clap::Parser;
use nwis::{Client, ClientOptions, PersistFailure};
use serde_json::json;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    // The file is the only product of a CLI run.
    let opts = ClientOptions {
        persist_failure: PersistFailure::Abort,
        ..ClientOptions::from_env()
    };
    let client = Client::new(opts)?;
    let retrieval = client.retrieve(&cli.request())?;

    if cli.print_metadata {
        let meta = json!({
            "sites": retrieval.sites,
            "variables": retrieval.variables,
        });
        println!("{}", serde_json::to_string_pretty(&meta)?);
    }

    if cli.output.is_file() {
        println!("Done");
    }
    Ok(())
}
