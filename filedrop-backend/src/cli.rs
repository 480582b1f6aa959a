//! Cli things
//!

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;

use crate::delivery::{DeliveryConfig, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_TTL_SECS};

pub fn db_path_default() -> String {
    shellexpand::tilde("~/.cache/filedrop.sqlite3").to_string()
}

#[derive(Parser, Debug)]
pub struct CliOpts {
    #[clap(long, help = "Path to the database file", env = "FILEDROP_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[clap(
        long,
        help = "How long an uploaded file lives, in seconds",
        env = "FILEDROP_TTL_SECS",
        default_value_t = DEFAULT_TTL_SECS
    )]
    pub ttl_secs: u64,

    #[clap(
        long,
        help = "Largest accepted upload, in bytes",
        env = "FILEDROP_MAX_UPLOAD_BYTES",
        default_value_t = DEFAULT_MAX_UPLOAD_BYTES
    )]
    pub max_upload_bytes: u64,

    #[clap(
        long,
        help = "Upper bound on any single database call, in seconds",
        env = "FILEDROP_STORE_TIMEOUT_SECS",
        default_value_t = 10
    )]
    pub store_timeout_secs: u64,

    #[clap(
        long,
        help = "Delete expired files in the background every N seconds",
        env = "FILEDROP_SWEEP_INTERVAL_SECS"
    )]
    pub sweep_interval_secs: Option<u64>,

    #[clap(
        long,
        help = "Include storage error detail in responses",
        env = "FILEDROP_DEV_MODE"
    )]
    pub dev_mode: bool,

    #[clap(long, help = "Enable debug logging")]
    pub debug: bool,
}

impl CliOpts {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| db_path_default().into())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        let ttl = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        DeliveryConfig {
            ttl,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}
