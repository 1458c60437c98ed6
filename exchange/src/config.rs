//! Runtime configuration with environment overrides.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fs::DEFAULT_IGNORE;

/// Transcript file the `@bash` command redirects into.
pub const DEFAULT_TRANSCRIPT: &str = ".exchange/bash.log";

/// Settings shared by the packer, commands and unpacker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Names skipped while walking directories (`EXCHANGE_IGNORE`, comma separated).
    pub ignore: Vec<String>,
    /// Transcript file for `@bash` lines (`EXCHANGE_TRANSCRIPT`).
    pub transcript: PathBuf,
    /// Preview writes instead of performing them (`EXCHANGE_DRY_RUN`).
    pub dry_run: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            ignore: std::env::var("EXCHANGE_IGNORE")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or_else(default_ignore),
            transcript: std::env::var("EXCHANGE_TRANSCRIPT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TRANSCRIPT)),
            dry_run: std::env::var("EXCHANGE_DRY_RUN")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

impl ExchangeConfig {
    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            ignore: default_ignore(),
            transcript: PathBuf::from(DEFAULT_TRANSCRIPT),
            dry_run: false,
        }
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let config = ExchangeConfig::builtin();
        assert_eq!(config.ignore, vec![".git", "node_modules", "target"]);
        assert_eq!(config.transcript, PathBuf::from(".exchange/bash.log"));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_parse_list_trims_and_drops_empty() {
        assert_eq!(parse_list(" .git, dist ,,vendor"), vec![".git", "dist", "vendor"]);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = ExchangeConfig::builtin().with_dry_run(true);
        let json = serde_json::to_string(&config).unwrap();
        let back: ExchangeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
