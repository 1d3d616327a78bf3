//! Server Configuration
//!
//! Startup settings parsed from the command line. The dispatcher only reads
//! `dir` and `dbfilename` (for `CONFIG GET`); everything else is consumed by
//! the binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// EmberKV server options
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "emberkv")]
#[command(about = "A small in-memory key-value server seeded from RDB snapshots")]
#[command(version)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Directory holding the snapshot file
    #[arg(long, default_value = "")]
    pub dir: String,

    /// Snapshot file name inside `--dir`
    #[arg(long, default_value = "")]
    pub dbfilename: String,

    /// Serve the snapshot read-through only, without loading it at startup
    #[arg(long)]
    pub no_preload: bool,

    /// Milliseconds between background expiry sweeps (0 disables the sweeper)
    #[arg(long, default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            dir: String::new(),
            dbfilename: String::new(),
            no_preload: false,
            sweep_interval_ms: 100,
            verbose: false,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `dir/dbfilename`, or `None` when no snapshot file is configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if self.dbfilename.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.dir).join(&self.dbfilename))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    /// Looks up a parameter exposed through `CONFIG GET`.
    pub fn get(&self, param: &str) -> Option<&str> {
        if param.eq_ignore_ascii_case("dir") {
            Some(&self.dir)
        } else if param.eq_ignore_ascii_case("dbfilename") {
            Some(&self.dbfilename)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let config = ServerConfig::try_parse_from([
            "emberkv",
            "--dir",
            "/tmp/redis-files",
            "--dbfilename",
            "dump.rdb",
            "--port",
            "6380",
        ])
        .unwrap();

        assert_eq!(config.dir, "/tmp/redis-files");
        assert_eq!(config.dbfilename, "dump.rdb");
        assert_eq!(config.bind_address(), "127.0.0.1:6380");
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("/tmp/redis-files/dump.rdb"))
        );
    }

    #[test]
    fn test_defaults_match_flag_defaults() {
        let parsed = ServerConfig::try_parse_from(["emberkv"]).unwrap();
        assert_eq!(parsed, ServerConfig::default());
        assert_eq!(parsed.snapshot_path(), None);
        assert_eq!(parsed.sweep_interval(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_get_known_and_unknown_params() {
        let config = ServerConfig {
            dir: "/data".to_string(),
            dbfilename: "x.rdb".to_string(),
            ..Default::default()
        };

        assert_eq!(config.get("dir"), Some("/data"));
        assert_eq!(config.get("DBFILENAME"), Some("x.rdb"));
        assert_eq!(config.get("maxmemory"), None);
    }

    #[test]
    fn test_sweeper_can_be_disabled() {
        let config = ServerConfig::try_parse_from(["emberkv", "--sweep-interval-ms", "0"]).unwrap();
        assert_eq!(config.sweep_interval(), None);
    }
}
