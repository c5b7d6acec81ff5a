// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Issuer key-set (JWKS) fetching and caching.
//!
//! ## Behaviour
//!
//! - One entry per normalized issuer origin, each with its own expiry
//! - Expiry follows the response's `Cache-Control: max-age`, else 5 minutes,
//!   never less than 10 seconds
//! - A failed fetch yields no keys and leaves the cache untouched, so a
//!   still-valid entry survives a provider outage
//! - Concurrent misses may fetch the same issuer twice; the last write wins
//!
//! The fetcher and clock are injected so the cache can be driven from tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CACHE_CONTROL;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::clock::Clock;

/// Path of the certificate endpoint under the issuer origin.
pub const ACCESS_CERTS_PATH: &str = "/cdn-cgi/access/certs";

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Floor applied to every TTL, including `max-age` from the response.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(10);

/// Default upper bound on a single key-set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A public key record from the issuer's key set.
///
/// Only the members the validator reads are kept. Everything is optional so
/// that one odd record never poisons the rest of the set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublicKeyRecord {
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub key_ops: Option<Vec<String>>,
    /// RSA modulus, base64url
    #[serde(default)]
    pub n: Option<String>,
    /// RSA public exponent, base64url
    #[serde(default)]
    pub e: Option<String>,
}

/// Raw response from the certificate endpoint.
#[derive(Debug, Clone, Default)]
pub struct KeySetDocument {
    pub body: Vec<u8>,
    pub cache_control: Option<String>,
}

/// Key-set fetch failure.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0} from key-set endpoint")]
    Status(u16),
    #[error("response is not JSON: {0}")]
    Decode(String),
}

/// Something that can retrieve a key-set document.
pub trait KeySetFetcher: Send + Sync {
    fn fetch(&self, url: &str)
        -> impl Future<Output = Result<KeySetDocument, KeySetError>> + Send;
}

/// Fetches key sets over HTTPS with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, url: &str) -> Result<KeySetDocument, KeySetError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeySetError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Status(response.status().as_u16()));
        }

        let cache_control = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| KeySetError::Transport(e.to_string()))?;

        Ok(KeySetDocument {
            body: body.to_vec(),
            cache_control,
        })
    }
}

/// URL of the key set for a normalized issuer origin.
pub fn key_set_url(issuer: &str) -> String {
    format!("{issuer}{ACCESS_CERTS_PATH}")
}

/// Extract a positive `max-age` directive, case-insensitively.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
    let lower = cache_control.to_ascii_lowercase();
    let start = lower.find("max-age=")? + "max-age=".len();
    let digits: String = lower[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let secs: u64 = digits.parse().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Parse a key-set body.
///
/// The body must be JSON. A missing or non-array `keys` member means an empty
/// set; entries that are not key objects are skipped.
pub fn parse_key_set(body: &[u8]) -> Result<Vec<PublicKeyRecord>, KeySetError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| KeySetError::Decode(e.to_string()))?;

    let keys = match value.get("keys").and_then(|k| k.as_array()) {
        Some(keys) => keys,
        None => return Ok(Vec::new()),
    };

    Ok(keys
        .iter()
        .filter(|k| k.is_object())
        .filter_map(|k| PublicKeyRecord::deserialize(k).ok())
        .collect())
}

/// Cached key set for one issuer.
#[derive(Debug, Clone)]
struct CacheEntry {
    keys: Arc<[PublicKeyRecord]>,
    expires_at: DateTime<Utc>,
}

/// Process-wide key-set cache keyed by normalized issuer.
pub struct KeySetCache<F> {
    fetcher: F,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    fetch_failures: AtomicU64,
}

impl<F: KeySetFetcher> KeySetCache<F> {
    /// Create an empty cache.
    pub fn new(fetcher: F, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            clock,
            entries: RwLock::new(HashMap::new()),
            fetch_failures: AtomicU64::new(0),
        }
    }

    /// Get the key set for `issuer`, fetching when missing, expired or forced.
    ///
    /// Returns an empty set when the fetch fails.
    pub async fn get_key_set(&self, issuer: &str, force_refresh: bool) -> Arc<[PublicKeyRecord]> {
        let now = self.clock.now();

        if !force_refresh {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(issuer) {
                if entry.expires_at > now {
                    return entry.keys.clone();
                }
            }
        }

        match self.refresh(issuer, now).await {
            Ok(keys) => keys,
            Err(e) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(issuer, error = %e, "Key-set fetch failed");
                Arc::from(Vec::new())
            }
        }
    }

    async fn refresh(
        &self,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<[PublicKeyRecord]>, KeySetError> {
        let document = self.fetcher.fetch(&key_set_url(issuer)).await?;
        let keys: Arc<[PublicKeyRecord]> = parse_key_set(&document.body)?.into();

        let ttl = document
            .cache_control
            .as_deref()
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_CACHE_TTL)
            .max(MIN_CACHE_TTL);
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        tracing::debug!(issuer, keys = keys.len(), ttl_secs = ttl.as_secs(), "Key set refreshed");

        let mut entries = self.entries.write().await;
        entries.insert(
            issuer.to_owned(),
            CacheEntry {
                keys: keys.clone(),
                expires_at,
            },
        );
        Ok(keys)
    }

    /// Check if `issuer` has a cached, unexpired key set.
    pub async fn is_cached(&self, issuer: &str) -> bool {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries.get(issuer).is_some_and(|e| e.expires_at > now)
    }

    /// Number of fetches that failed since start.
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedFetcher;
    use super::*;
    use crate::auth::clock::testing::ManualClock;
    use serde_json::json;

    const ISSUER: &str = "https://team.cloudflareaccess.com";

    fn key_set(kids: &[&str]) -> serde_json::Value {
        json!({
            "keys": kids
                .iter()
                .map(|kid| json!({"kty": "RSA", "kid": kid, "alg": "RS256", "n": "AQAB", "e": "AQAB"}))
                .collect::<Vec<_>>()
        })
    }

    fn cache(fetcher: ScriptedFetcher) -> (KeySetCache<ScriptedFetcher>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_760_000_000));
        (KeySetCache::new(fetcher, clock.clone()), clock)
    }

    fn kids(keys: &[PublicKeyRecord]) -> Vec<&str> {
        keys.iter().filter_map(|k| k.kid.as_deref()).collect()
    }

    #[test]
    fn key_set_url_appends_certs_path() {
        assert_eq!(
            key_set_url(ISSUER),
            "https://team.cloudflareaccess.com/cdn-cgi/access/certs"
        );
    }

    #[test]
    fn max_age_parsing() {
        assert_eq!(parse_max_age("max-age=60"), Some(Duration::from_secs(60)));
        assert_eq!(
            parse_max_age("public, MAX-AGE=3600, must-revalidate"),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(parse_max_age("max-age=0"), None);
        assert_eq!(parse_max_age("max-age=abc"), None);
        assert_eq!(parse_max_age("no-store"), None);
        assert_eq!(parse_max_age(""), None);
    }

    #[test]
    fn key_set_parsing_is_lenient_about_shape() {
        assert!(parse_key_set(br#"{}"#).unwrap().is_empty());
        assert!(parse_key_set(br#"{"keys":"nope"}"#).unwrap().is_empty());
        assert!(parse_key_set(br#"[1,2,3]"#).unwrap().is_empty());

        let keys =
            parse_key_set(br#"{"keys":[1,"x",{"kty":"RSA","kid":"a"},{"kid":7},{"kty":"EC","kid":"b"}]}"#)
                .unwrap();
        assert_eq!(kids(&keys), vec!["a", "b"]);
    }

    #[test]
    fn key_usage_members_are_parsed() {
        let keys = parse_key_set(
            br#"{"keys":[{"kty":"RSA","kid":"a","alg":"RS256","use":"sig","key_ops":["verify"]}]}"#,
        )
        .unwrap();
        assert_eq!(keys[0].key_use.as_deref(), Some("sig"));
        assert_eq!(keys[0].key_ops, Some(vec!["verify".to_string()]));
    }

    #[test]
    fn key_set_parsing_rejects_non_json() {
        assert!(matches!(
            parse_key_set(b"<html>"),
            Err(KeySetError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        let (cache, _clock) = cache(ScriptedFetcher::new());
        assert!(!cache.is_cached(ISSUER).await);
        assert_eq!(cache.fetch_failures(), 0);
    }

    #[tokio::test]
    async fn cached_entry_is_served_without_fetching() {
        let fetcher = ScriptedFetcher::new().respond_json(key_set(&["k1"]), None);
        let (cache, _clock) = cache(fetcher);

        let first = cache.get_key_set(ISSUER, false).await;
        let second = cache.get_key_set(ISSUER, false).await;

        assert_eq!(kids(&first), vec!["k1"]);
        assert_eq!(kids(&second), vec!["k1"]);
        assert_eq!(
            cache.fetcher.calls(),
            vec!["https://team.cloudflareaccess.com/cdn-cgi/access/certs"]
        );
        assert!(cache.is_cached(ISSUER).await);
    }

    #[tokio::test]
    async fn default_ttl_applies_without_max_age() {
        let fetcher = ScriptedFetcher::new()
            .respond_json(key_set(&["k1"]), None)
            .respond_json(key_set(&["k2"]), None);
        let (cache, clock) = cache(fetcher);

        cache.get_key_set(ISSUER, false).await;
        clock.advance(TimeDelta::seconds(299));
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1"]);

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k2"]);
        assert_eq!(cache.fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn max_age_sets_ttl() {
        let fetcher = ScriptedFetcher::new()
            .respond_json(key_set(&["k1"]), Some("public, max-age=30"))
            .respond_json(key_set(&["k2"]), None);
        let (cache, clock) = cache(fetcher);

        cache.get_key_set(ISSUER, false).await;
        clock.advance(TimeDelta::seconds(29));
        assert!(cache.is_cached(ISSUER).await);
        clock.advance(TimeDelta::seconds(1));
        assert!(!cache.is_cached(ISSUER).await);
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k2"]);
    }

    #[tokio::test]
    async fn tiny_max_age_is_floored() {
        let fetcher = ScriptedFetcher::new().respond_json(key_set(&["k1"]), Some("max-age=1"));
        let (cache, clock) = cache(fetcher);

        cache.get_key_set(ISSUER, false).await;
        clock.advance(TimeDelta::seconds(9));
        assert!(cache.is_cached(ISSUER).await);
        clock.advance(TimeDelta::seconds(1));
        assert!(!cache.is_cached(ISSUER).await);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_entry() {
        let fetcher = ScriptedFetcher::new()
            .respond_json(key_set(&["k1"]), None)
            .respond_json(key_set(&["k1", "k2"]), None);
        let (cache, _clock) = cache(fetcher);

        cache.get_key_set(ISSUER, false).await;
        let refreshed = cache.get_key_set(ISSUER, true).await;

        assert_eq!(kids(&refreshed), vec!["k1", "k2"]);
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1", "k2"]);
        assert_eq!(cache.fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_valid_entry() {
        let fetcher = ScriptedFetcher::new()
            .respond_json(key_set(&["k1"]), None)
            .fail(KeySetError::Transport("connection reset".into()))
            .fail(KeySetError::Status(503));
        let (cache, _clock) = cache(fetcher);

        cache.get_key_set(ISSUER, false).await;
        assert!(cache.get_key_set(ISSUER, true).await.is_empty());
        assert!(cache.get_key_set(ISSUER, true).await.is_empty());

        assert!(cache.is_cached(ISSUER).await);
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1"]);
        assert_eq!(cache.fetch_failures(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let fetcher = ScriptedFetcher::new()
            .fail(KeySetError::Status(500))
            .respond(Ok(KeySetDocument {
                body: b"not json".to_vec(),
                cache_control: None,
            }))
            .respond_json(key_set(&["k1"]), None);
        let (cache, _clock) = cache(fetcher);

        assert!(cache.get_key_set(ISSUER, false).await.is_empty());
        assert!(cache.get_key_set(ISSUER, false).await.is_empty());
        assert!(!cache.is_cached(ISSUER).await);
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1"]);
        assert_eq!(cache.fetcher.calls().len(), 3);
        assert_eq!(cache.fetch_failures(), 2);
    }

    #[tokio::test]
    async fn empty_key_set_is_cached() {
        let fetcher = ScriptedFetcher::new().respond_json(json!({"keys": []}), None);
        let (cache, _clock) = cache(fetcher);

        assert!(cache.get_key_set(ISSUER, false).await.is_empty());
        assert!(cache.is_cached(ISSUER).await);
        assert_eq!(cache.fetch_failures(), 0);
    }

    #[tokio::test]
    async fn issuers_are_cached_separately() {
        let other = "https://other.cloudflareaccess.com";
        let fetcher = ScriptedFetcher::new()
            .respond_json(key_set(&["k1"]), None)
            .respond_json(key_set(&["k9"]), None);
        let (cache, _clock) = cache(fetcher);

        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1"]);
        assert_eq!(kids(&cache.get_key_set(other, false).await), vec!["k9"]);
        assert_eq!(kids(&cache.get_key_set(ISSUER, false).await), vec!["k1"]);
        assert_eq!(
            cache.fetcher.calls()[1],
            "https://other.cloudflareaccess.com/cdn-cgi/access/certs"
        );
    }

    mod http {
        use super::*;
        use axum::{http::StatusCode, routing::get, Router};

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn http_fetcher_returns_body_and_cache_control() {
            let base = serve(Router::new().route(
                ACCESS_CERTS_PATH,
                get(|| async {
                    (
                        [(CACHE_CONTROL, "public, max-age=120")],
                        r#"{"keys":[{"kty":"RSA","kid":"k1"}]}"#,
                    )
                }),
            ))
            .await;

            let fetcher = HttpKeySetFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap();
            let document = fetcher.fetch(&key_set_url(&base)).await.unwrap();

            assert_eq!(document.cache_control.as_deref(), Some("public, max-age=120"));
            let keys = parse_key_set(&document.body).unwrap();
            assert_eq!(kids(&keys), vec!["k1"]);
        }

        #[tokio::test]
        async fn http_fetcher_reports_error_status() {
            let base = serve(Router::new().route(
                ACCESS_CERTS_PATH,
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            ))
            .await;

            let fetcher = HttpKeySetFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap();
            let err = fetcher.fetch(&key_set_url(&base)).await.unwrap_err();
            assert!(matches!(err, KeySetError::Status(503)));
        }

        #[tokio::test]
        async fn http_fetcher_times_out() {
            let base = serve(Router::new().route(
                ACCESS_CERTS_PATH,
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "{}"
                }),
            ))
            .await;

            let fetcher = HttpKeySetFetcher::new(Duration::from_millis(200)).unwrap();
            let err = fetcher.fetch(&key_set_url(&base)).await.unwrap_err();
            assert!(matches!(err, KeySetError::Transport(_)));
        }
    }
}
