//! Centralized defaults, format strings and unit sizes.

/// Cycle period used when the configured interval is missing or non-positive.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Storage budget used when the configured limit is missing or non-positive.
pub const DEFAULT_BUDGET_MB: u64 = 20;

/// Capture file name, local time (YYYY_MM_DD__hh_mm_ss.png).
pub const FILE_NAME_FORMAT: &str = "%Y_%m_%d__%H_%M_%S.png";

pub const BYTES_PER_KB: u64 = 1024;
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Directory under the platform config dir holding the settings file.
pub const APP_CONFIG_DIR_NAME: &str = "screenshoter";

pub const CONFIG_FILE_NAME: &str = "config.toml";
