// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the settings loaded from them
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `API_TOKEN` | Shared bearer secret | Unset (bearer auth disabled) |
//! | `CLOUDFLARE_ACCESS_AUD` | Comma-separated Access audience tags | Unset (Access auth disabled) |
//! | `CF_ACCESS_AUD` | Fallback for `CLOUDFLARE_ACCESS_AUD` | Unset |
//! | `ACCESS_JWKS_TIMEOUT_SECS` | Timeout for one JWKS fetch | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use crate::auth::jwks::DEFAULT_FETCH_TIMEOUT;
use crate::logging::LogFormat;

/// Shared bearer secret.
pub const API_TOKEN_ENV: &str = "API_TOKEN";

/// Audience allow-list for Cloudflare Access assertions.
pub const ACCESS_AUD_ENV: &str = "CLOUDFLARE_ACCESS_AUD";

/// Legacy name of [`ACCESS_AUD_ENV`], read only when that is unset.
pub const ACCESS_AUD_FALLBACK_ENV: &str = "CF_ACCESS_AUD";

/// Timeout in seconds for one JWKS fetch.
pub const JWKS_TIMEOUT_ENV: &str = "ACCESS_JWKS_TIMEOUT_SECS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` when unset or blank.
    pub api_token: Option<String>,
    /// Empty when unset.
    pub access_audiences: Vec<String>,
    pub jwks_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_token = lookup(API_TOKEN_ENV).filter(|token| !token.trim().is_empty());

        let access_audiences = lookup(ACCESS_AUD_ENV)
            .or_else(|| lookup(ACCESS_AUD_FALLBACK_ENV))
            .map(|raw| parse_audiences(&raw))
            .unwrap_or_default();

        let jwks_timeout = match lookup(JWKS_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "Invalid {JWKS_TIMEOUT_ENV}, using default");
                    DEFAULT_FETCH_TIMEOUT
                }
            },
            None => DEFAULT_FETCH_TIMEOUT,
        };

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup(PORT_ENV)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let log_format = lookup(LOG_FORMAT_ENV)
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Self {
            api_token,
            access_audiences,
            jwks_timeout,
            host,
            port,
            log_format,
        }
    }
}

/// Split a comma-separated audience list, trimming and dropping empty entries.
pub fn parse_audiences(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|aud| !aud.is_empty())
        .map(String::from)
        .collect()
}
