// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! # Runtime Configuration
//!
//! All configuration comes from the environment and is loaded once at
//! startup into [`GatewayConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` / `PORT` | Server bind address | `0.0.0.0` / `8080` |
//! | `DATA_DIR` | Directory holding `gateway.redb` | `./data` |
//! | `SESSION_SECRET` | HMAC key for token hashing and challenges | Required |
//! | `SESSION_TTL_HOURS` | Session lifetime | `24` |
//! | `SESSION_CACHE_CAPACITY` | Cached sessions | `1024` |
//! | `SESSION_CACHE_TTL_SECS` | Cache entry lifetime | `60` |
//! | `CIRCLE_API_KEY` | Enables custodial wallets | Optional |
//! | `CIRCLE_ENTITY_SECRET_CIPHERTEXT` | Required with `CIRCLE_API_KEY` | - |
//! | `CIRCLE_WALLET_SET_ID` | Required with `CIRCLE_API_KEY` | - |
//! | `CIRCLE_API_BASE_URL` | Circle API | `https://api.circle.com` |
//! | `CIRCLE_BLOCKCHAIN` | Blockchain of new wallets | settlement network |
//! | `LIFI_API_BASE_URL` | Routing API | `https://li.quest/v1` |
//! | `LIFI_API_KEY` | Raises routing rate limits | Optional |
//! | `LIFI_INTEGRATOR` | Integrator tag on quotes | `hati` |
//! | `MORALIS_API_KEY` | Enables payer token balances | Optional |
//! | `MORALIS_API_BASE_URL` | Moralis API | `https://deep-index.moralis.io` |
//! | `SETTLEMENT_NETWORK` | `base` or `base-sepolia` | `base-sepolia` |
//! | `SETTLEMENT_RPC_URL` | RPC override | network default |
//! | `FAST_PROTOCOLS` | Comma-separated fast-settlement tools | `cctp,circle` |
//! | `YIELD_MIN_BALANCE` | Yield eligibility threshold | `200` |
//! | `YIELD_EXECUTION_DELAY_MS` | Simulated deposit latency | `1500` |
//! | `BRIDGE_POLL_INTERVAL_SECS` | Completion poll period | `5` |
//! | `BRIDGE_POLL_MAX_ATTEMPTS` | Polls per payment | `60` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Enable HTTPS | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::SettlementNetwork;
use crate::routing::DEFAULT_FAST_PROTOCOLS;
use crate::yield_opt::{DEFAULT_EXECUTION_DELAY, MIN_YIELD_BALANCE};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_SESSION_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_SESSION_CACHE_TTL_SECS: u64 = 60;

pub const DEFAULT_CIRCLE_BASE_URL: &str = "https://api.circle.com";
pub const DEFAULT_LIFI_BASE_URL: &str = "https://li.quest/v1";
pub const DEFAULT_LIFI_INTEGRATOR: &str = "hati";
pub const DEFAULT_MORALIS_BASE_URL: &str = "https://deep-index.moralis.io";

pub const DEFAULT_BRIDGE_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_BRIDGE_POLL_MAX_ATTEMPTS: u32 = 60;

/// Vendor HTTP timeout.
pub const VENDOR_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleConfig {
    pub api_key: String,
    pub entity_secret_ciphertext: String,
    pub wallet_set_id: String,
    pub base_url: String,
    pub blockchain: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub integrator: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoralisConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub session_cache_capacity: usize,
    pub session_cache_ttl: Duration,
    pub circle: Option<CircleConfig>,
    pub lifi: LifiConfig,
    pub moralis: Option<MoralisConfig>,
    pub settlement_network: SettlementNetwork,
    pub settlement_rpc_url: Option<String>,
    pub fast_protocols: Vec<String>,
    pub yield_min_balance: f64,
    pub yield_execution_delay: Duration,
    pub bridge_poll_interval: Duration,
    pub bridge_poll_max_attempts: u32,
    pub tls: Option<TlsConfig>,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let session_secret = env.required("SESSION_SECRET")?;
        let settlement_network: SettlementNetwork =
            env.parsed("SETTLEMENT_NETWORK", SettlementNetwork::BaseSepolia)?;

        let circle = match env.optional("CIRCLE_API_KEY") {
            Some(api_key) => Some(CircleConfig {
                api_key,
                entity_secret_ciphertext: env.required("CIRCLE_ENTITY_SECRET_CIPHERTEXT")?,
                wallet_set_id: env.required("CIRCLE_WALLET_SET_ID")?,
                base_url: env.or_default("CIRCLE_API_BASE_URL", DEFAULT_CIRCLE_BASE_URL),
                blockchain: env.or_default(
                    "CIRCLE_BLOCKCHAIN",
                    settlement_network.config().circle_blockchain,
                ),
            }),
            None => None,
        };

        let lifi = LifiConfig {
            base_url: env.or_default("LIFI_API_BASE_URL", DEFAULT_LIFI_BASE_URL),
            api_key: env.optional("LIFI_API_KEY"),
            integrator: env.or_default("LIFI_INTEGRATOR", DEFAULT_LIFI_INTEGRATOR),
        };

        let moralis = env.optional("MORALIS_API_KEY").map(|api_key| MoralisConfig {
            api_key,
            base_url: env.or_default("MORALIS_API_BASE_URL", DEFAULT_MORALIS_BASE_URL),
        });

        let fast_protocols = match env.optional("FAST_PROTOCOLS") {
            Some(raw) => parse_list(&raw),
            None => DEFAULT_FAST_PROTOCOLS.iter().map(|s| s.to_string()).collect(),
        };

        let session_ttl_hours: i64 = env.parsed("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_HOURS",
                value: session_ttl_hours.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let yield_min_balance: f64 = env.parsed("YIELD_MIN_BALANCE", MIN_YIELD_BALANCE)?;
        if !yield_min_balance.is_finite() || yield_min_balance < 0.0 {
            return Err(ConfigError::Invalid {
                name: "YIELD_MIN_BALANCE",
                value: yield_min_balance.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }

        let tls = match (env.optional("TLS_CERT_PATH"), env.optional("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("TLS_KEY_PATH")),
            (None, Some(_)) => return Err(ConfigError::Missing("TLS_CERT_PATH")),
        };

        Ok(Self {
            host: env.or_default(HOST_ENV, DEFAULT_HOST),
            port: env.parsed(PORT_ENV, DEFAULT_PORT)?,
            data_dir: PathBuf::from(env.or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            session_secret,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            session_cache_capacity: env
                .parsed("SESSION_CACHE_CAPACITY", DEFAULT_SESSION_CACHE_CAPACITY)?,
            session_cache_ttl: Duration::from_secs(
                env.parsed("SESSION_CACHE_TTL_SECS", DEFAULT_SESSION_CACHE_TTL_SECS)?,
            ),
            circle,
            lifi,
            moralis,
            settlement_network,
            settlement_rpc_url: env.optional("SETTLEMENT_RPC_URL"),
            fast_protocols,
            yield_min_balance,
            yield_execution_delay: Duration::from_millis(env.parsed(
                "YIELD_EXECUTION_DELAY_MS",
                DEFAULT_EXECUTION_DELAY.as_millis() as u64,
            )?),
            bridge_poll_interval: Duration::from_secs(
                env.parsed("BRIDGE_POLL_INTERVAL_SECS", DEFAULT_BRIDGE_POLL_INTERVAL_SECS)?,
            ),
            bridge_poll_max_attempts: env
                .parsed("BRIDGE_POLL_MAX_ATTEMPTS", DEFAULT_BRIDGE_POLL_MAX_ATTEMPTS)?,
            tls,
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::DATABASE_FILE)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_the_secret() {
        let config = load(&[("SESSION_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.fast_protocols, vec!["cctp", "circle"]);
        assert_eq!(config.yield_min_balance, 200.0);
        assert_eq!(config.yield_execution_delay, Duration::from_millis(1500));
        assert_eq!(config.bridge_poll_interval, Duration::from_secs(5));
        assert_eq!(config.bridge_poll_max_attempts, 60);
        assert_eq!(config.settlement_network, SettlementNetwork::BaseSepolia);
        assert_eq!(config.lifi.base_url, DEFAULT_LIFI_BASE_URL);
        assert!(config.circle.is_none());
        assert!(config.moralis.is_none());
        assert!(config.tls.is_none());
        assert!(config.database_path().ends_with("gateway.redb"));
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("SESSION_SECRET"));
        assert_eq!(
            load(&[("SESSION_SECRET", "   ")]).unwrap_err(),
            ConfigError::Missing("SESSION_SECRET")
        );
    }

    #[test]
    fn circle_needs_its_companions() {
        let err = load(&[("SESSION_SECRET", "s"), ("CIRCLE_API_KEY", "k")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CIRCLE_ENTITY_SECRET_CIPHERTEXT"));

        let config = load(&[
            ("SESSION_SECRET", "s"),
            ("CIRCLE_API_KEY", "k"),
            ("CIRCLE_ENTITY_SECRET_CIPHERTEXT", "c"),
            ("CIRCLE_WALLET_SET_ID", "ws"),
            ("SETTLEMENT_NETWORK", "base"),
        ])
        .unwrap();
        let circle = config.circle.unwrap();
        assert_eq!(circle.blockchain, "BASE");
        assert_eq!(circle.base_url, DEFAULT_CIRCLE_BASE_URL);
    }

    #[test]
    fn fast_protocols_are_configurable() {
        let config = load(&[("SESSION_SECRET", "s"), ("FAST_PROTOCOLS", " cctp , across ,,")])
            .unwrap();
        assert_eq!(config.fast_protocols, vec!["cctp", "across"]);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = load(&[("SESSION_SECRET", "s"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = load(&[("SESSION_SECRET", "s"), ("SESSION_TTL_HOURS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SESSION_TTL_HOURS", .. }));
    }

    #[test]
    fn tls_paths_come_in_pairs() {
        let err = load(&[("SESSION_SECRET", "s"), ("TLS_CERT_PATH", "/c.pem")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TLS_KEY_PATH"));

        let config = load(&[
            ("SESSION_SECRET", "s"),
            ("TLS_CERT_PATH", "/c.pem"),
            ("TLS_KEY_PATH", "/k.pem"),
        ])
        .unwrap();
        assert_eq!(config.tls.unwrap().key_path, PathBuf::from("/k.pem"));
    }
}
