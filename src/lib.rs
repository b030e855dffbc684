pub mod capture;
pub mod cli;
pub mod config;
pub mod constants;
pub mod driver;
pub mod retention;

use capture::PrimaryMonitor;
use clap::Parser;
use cli::Cli;
use driver::Driver;
use std::io::IsTerminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging();
    info!("started");

    let config = config::load(&cli).map_err(AppError::Config)?;
    info!(interval_secs = config.interval_secs, "set interval");
    info!(budget_mb = config.budget_mb, "set storage limit");
    info!(path = %config.storage_path.display(), "set path");

    let (_shutdown_handle, shutdown) = driver::shutdown_channel();
    let mut driver = Driver::new(&config, PrimaryMonitor);
    if let Some(cycles) = cli.cycles {
        driver = driver.with_max_cycles(cycles);
    }
    driver.run(&shutdown);
    Ok(())
}
