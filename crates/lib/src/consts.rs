//! Crate-wide constants.

/// Application name, used in lock metadata and generated file headers.
pub const APP_NAME: &str = "metabuild";

/// Number of hex characters kept from a SHA-256 digest for request keys.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Project configuration file name, relative to the project root.
pub const CONFIG_FILENAME: &str = "metabuild.yaml";

/// Format version written into every persisted build unit.
pub const UNIT_FORMAT_VERSION: u32 = 2;

/// Overrides `build.stamper` from the project configuration.
pub const STAMPER_ENV: &str = "METABUILD_STAMPER";

/// Overrides `build.tool_timeout_secs` from the project configuration.
pub const TOOL_TIMEOUT_ENV: &str = "METABUILD_TOOL_TIMEOUT_SECS";
