use clap::{value_parser, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (TOML). Defaults to <config dir>/screenshoter/config.toml.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait between captures. Overrides `interval` from the settings file.
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Storage budget in megabytes. Overrides `limit` from the settings file.
    #[arg(long, value_name = "MB", allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Directory that receives the screenshots. Overrides `path` from the settings file.
    #[arg(long, value_name = "DIR")]
    pub path: Option<String>,

    /// Stop after this many cycles instead of running until killed.
    #[arg(long, value_name = "N", value_parser = value_parser!(u64).range(1..))]
    pub cycles: Option<u64>,
}
