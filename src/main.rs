use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use junction::config::Config;
use junction::{proxy, telemetry};

#[derive(Parser)]
#[command(name = "junction")]
#[command(about = "Rule-routing DNS forwarder", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "junction.toml")]
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    telemetry::init(&config.log_level).map_err(|e| e as Box<dyn Error>)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(proxy::run(config))?;
    Ok(())
}
