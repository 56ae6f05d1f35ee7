//! Environment-derived configuration.
//!
//! Everything is read once at startup; invalid or missing required values
//! fail the boot rather than a later request. `NUM_SEARCH_RESULTS` in
//! particular is a startup-time failure by contract — the search tool
//! must never discover a broken config mid-call.

use crate::sandbox::DEFAULT_DENYLIST;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`KELPIE_PORT`, default 8000).
    pub port: u16,
    /// SQLite database path (`KELPIE_DB_PATH`).
    pub db_path: String,
    /// OpenAI-compatible API root (`LLM_BASE_URL`).
    pub llm_base_url: String,
    /// Bearer credential for the model endpoint (`LLM_API_KEY`), optional.
    pub llm_api_key: Option<String>,
    /// Result pages the search tool retrieves (`NUM_SEARCH_RESULTS`), required.
    pub num_search_results: usize,
    /// Call-target names the sandbox rejects (`SANDBOX_DENYLIST`,
    /// comma-separated; defaults to the documented set).
    pub sandbox_denylist: Vec<String>,
    /// HS256 secret for access tokens (`KELPIE_SECRET_KEY`), required.
    pub secret_key: String,
    /// Access-token lifetime in minutes (`KELPIE_TOKEN_TTL_MINUTES`, default 15).
    pub token_ttl_minutes: i64,
    /// Deadline around each tool invocation (`KELPIE_TOOL_TIMEOUT_SECS`, default 120).
    pub tool_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source, so tests never touch the
    /// process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_or(&lookup, "KELPIE_PORT", 8000u16)?;

        let db_path = lookup("KELPIE_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.kelpie/kelpie.db")
        });

        let llm_base_url = lookup("LLM_BASE_URL")
            .unwrap_or_else(|| "http://localhost:11434/v1".to_string());
        let llm_api_key = lookup("LLM_API_KEY").filter(|key| !key.is_empty());

        let num_search_results = match lookup("NUM_SEARCH_RESULTS") {
            None => return Err(ConfigError::Missing("NUM_SEARCH_RESULTS")),
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: "NUM_SEARCH_RESULTS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };
        if num_search_results == 0 {
            return Err(ConfigError::Invalid {
                name: "NUM_SEARCH_RESULTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let sandbox_denylist = match lookup("SANDBOX_DENYLIST") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect(),
        };

        let secret_key = lookup("KELPIE_SECRET_KEY")
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("KELPIE_SECRET_KEY"))?;

        let token_ttl_minutes = parse_or(&lookup, "KELPIE_TOKEN_TTL_MINUTES", 15i64)?;
        let tool_timeout_secs = parse_or(&lookup, "KELPIE_TOOL_TIMEOUT_SECS", 120u64)?;

        Ok(Self {
            port,
            db_path,
            llm_base_url,
            llm_api_key,
            num_search_results,
            sandbox_denylist,
            secret_key,
            token_ttl_minutes,
            tool_timeout_secs,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("NUM_SEARCH_RESULTS", "3"),
            ("KELPIE_SECRET_KEY", "test-secret"),
        ]
    }

    #[test]
    fn test_minimal_config_with_defaults() {
        let config = config_from(&minimal()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.num_search_results, 3);
        assert_eq!(config.token_ttl_minutes, 15);
        assert_eq!(config.tool_timeout_secs, 120);
        assert_eq!(config.sandbox_denylist.len(), DEFAULT_DENYLIST.len());
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_missing_search_results_fails_startup() {
        let err = config_from(&[("KELPIE_SECRET_KEY", "s")]).unwrap_err();
        assert!(err.to_string().contains("NUM_SEARCH_RESULTS"));
    }

    #[test]
    fn test_invalid_search_results_fails_startup() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "NUM_SEARCH_RESULTS");
        pairs.push(("NUM_SEARCH_RESULTS", "three"));
        assert!(config_from(&pairs).is_err());

        pairs.retain(|(k, _)| *k != "NUM_SEARCH_RESULTS");
        pairs.push(("NUM_SEARCH_RESULTS", "0"));
        assert!(config_from(&pairs).is_err());
    }

    #[test]
    fn test_missing_secret_key_fails_startup() {
        let err = config_from(&[("NUM_SEARCH_RESULTS", "3")]).unwrap_err();
        assert!(err.to_string().contains("KELPIE_SECRET_KEY"));
    }

    #[test]
    fn test_denylist_override() {
        let mut pairs = minimal();
        pairs.push(("SANDBOX_DENYLIST", "open, spawn ,, exec"));
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.sandbox_denylist, vec!["open", "spawn", "exec"]);
    }

    #[test]
    fn test_port_and_ttl_overrides() {
        let mut pairs = minimal();
        pairs.push(("KELPIE_PORT", "9001"));
        pairs.push(("KELPIE_TOKEN_TTL_MINUTES", "60"));
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.token_ttl_minutes, 60);
    }

    #[test]
    fn test_invalid_port_fails_startup() {
        let mut pairs = minimal();
        pairs.push(("KELPIE_PORT", "not-a-port"));
        assert!(config_from(&pairs).is_err());
    }

    #[test]
    fn test_db_path_falls_back_to_home() {
        let mut pairs = minimal();
        pairs.push(("HOME", "/home/someone"));
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.db_path, "/home/someone/.kelpie/kelpie.db");
    }
}
