//! linearize-data: construct a linear, no-fork copy of the block chain.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin linearize-data -- linearize.cfg
//! ```
//!
//! The config file holds `key=value` lines (`#` starts a comment):
//!
//! ```text
//! netmagic=70352205
//! input=/home/user/.coin/blocks
//! hashlist=hashlist.txt
//! output=/tmp/linear
//! max_out_sz=1000000000
//! split_timestamp=1
//! file_timestamp=1
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use linearblox::config::Settings;
use linearblox::run_linearize;
use linearblox::telemetry::{init_tracing, TelemetryConfig};

#[derive(Parser, Debug)]
#[clap(name = "linearize-data")]
#[clap(about = "Rebuild a canonical, fork-free chain from blk*.dat files", long_about = None)]
struct Args {
    /// Path to the linearize config file
    config: PathBuf,

    /// Print the run summary as JSON on stdout
    #[clap(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_tracing(TelemetryConfig::from_settings(&settings)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };
    settings.log_config_warnings();

    match run_linearize(&settings) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("❌ Failed to encode summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(class = ?e.class(), error = %e, "Linearize failed");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
