//! DEPOT Core - shared types for the registry storage adapter
//!
//! Errors, configuration, and the pure helpers (file info, object keys,
//! URLs) that the storage crate builds on. No I/O happens in this crate
//! apart from reading a config file.

pub mod config;
pub mod error;
pub mod file_info;
pub mod paths;

pub use config::{
    DepotConfig, S3Config, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REFRESH_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use error::{
    ConfigError, DepotError, DepotResult, StoreError, DIR_NOT_FOUND_CODE, FILE_NOT_FOUND_CODE,
    FILE_NOT_VALID_CODE,
};
pub use file_info::{extname, get_file_info, mime_type_for, FileInfo};
pub use paths::{
    child_name, component_url, invalid_key_reason, next_year, next_year_from, normalize_dir, update_log_path,
    upload_key, DELIMITER, UPDATE_LOG_FILE,
};
