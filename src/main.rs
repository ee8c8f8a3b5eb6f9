use std::io::{self, Write};

use clap::Parser;
use env_logger::Env;

use stream_loader::config::{Args, LoaderConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match LoaderConfig::try_from(Args::parse()) {
        Ok(config) => config,
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(2);
        }
    };

    log::info!(
        "loading stdin into '{}' with up to {} concurrent insertions",
        config.table_name,
        config.max_concurrency
    );

    let report = match stream_loader::run(&config, io::stdin()).await {
        Ok(report) => report,
        Err(err) => {
            log::error!("load aborted: {}", err);
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    };

    for line in report.to_string().lines() {
        log::info!("{}", line);
    }

    if config.json_report {
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}
