// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cloudflare Access assertion validation.
//!
//! The assertion arrives in `Cf-Access-Jwt-Assertion`. It is accepted only
//! when every gate passes, in order: structure, header (RS256 + kid), time
//! claims, audience allow-list, issuer origin, key lookup, key type and the
//! RSASSA-PKCS1-v1_5 / SHA-256 signature over the first two segments.

use std::sync::Arc;

use axum::http::HeaderMap;
use base64ct::{Base64UrlUnpadded, Encoding};
use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA256};

use super::assertion::ParsedAssertion;
use super::clock::Clock;
use super::issuer::normalize_issuer;
use super::jwks::{KeySetCache, KeySetFetcher, PublicKeyRecord};
use super::AuthError;

/// Header carrying the signed assertion.
pub const ACCESS_ASSERTION_HEADER: &str = "cf-access-jwt-assertion";

/// Validates access assertions against an audience allow-list.
pub struct AccessValidator<F> {
    audiences: Vec<String>,
    keys: Arc<KeySetCache<F>>,
    clock: Arc<dyn Clock>,
}

impl<F: KeySetFetcher> AccessValidator<F> {
    /// Create a validator. An empty `audiences` list disables this path.
    pub fn new(audiences: Vec<String>, keys: Arc<KeySetCache<F>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            audiences,
            keys,
            clock,
        }
    }

    /// Whether an audience allow-list is configured.
    pub fn is_configured(&self) -> bool {
        !self.audiences.is_empty()
    }

    /// The key-set cache backing this validator.
    pub fn key_cache(&self) -> &KeySetCache<F> {
        &self.keys
    }

    /// Run every gate against the request's assertion header.
    pub async fn validate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let assertion = headers
            .get(ACCESS_ASSERTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        if self.audiences.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let parsed = ParsedAssertion::parse(assertion)?;
        let kid = parsed.header.validate()?;
        parsed.claims.validate_times(self.clock.now().timestamp())?;
        parsed.claims.validate_audience(&self.audiences)?;

        let raw_issuer = parsed.claims.iss.as_deref().ok_or(AuthError::InvalidIssuer)?;
        let issuer = normalize_issuer(raw_issuer)?;

        let key = self.find_key(&issuer, kid).await?;
        verify_signature(&parsed, &key)
    }

    /// Boolean verdict for the assertion path.
    pub async fn is_assertion_authorized(&self, headers: &HeaderMap) -> bool {
        self.validate(headers).await.is_ok()
    }

    /// Look up `kid`, forcing one refresh of the issuer's key set on a miss.
    async fn find_key(&self, issuer: &str, kid: &str) -> Result<PublicKeyRecord, AuthError> {
        let keys = self.keys.get_key_set(issuer, false).await;
        if let Some(key) = find_by_kid(&keys, kid) {
            return Ok(key);
        }

        tracing::debug!(issuer, kid, "Key not in cached set, refreshing");
        let keys = self.keys.get_key_set(issuer, true).await;
        find_by_kid(&keys, kid).ok_or(AuthError::NoMatchingKey)
    }
}

fn find_by_kid(keys: &[PublicKeyRecord], kid: &str) -> Option<PublicKeyRecord> {
    keys.iter().find(|k| k.kid.as_deref() == Some(kid)).cloned()
}

/// Verify the assertion's RS256 signature with an RSA key record.
///
/// The record must be usable for RS256 verification: `alg`, `use` and
/// `key_ops`, when present, must allow it.
pub fn verify_signature(parsed: &ParsedAssertion, key: &PublicKeyRecord) -> Result<(), AuthError> {
    if key.kty.as_deref() != Some("RSA") || !permits_rs256_verify(key) {
        return Err(AuthError::UnsupportedKeyType);
    }
    let n = decode_component(key.n.as_deref())?;
    let e = decode_component(key.e.as_deref())?;

    let public_key = RsaPublicKeyComponents {
        n: strip_leading_zeros(&n),
        e: strip_leading_zeros(&e),
    };
    public_key
        .verify(
            &RSA_PKCS1_2048_8192_SHA256,
            parsed.signing_input.as_bytes(),
            &parsed.signature,
        )
        .map_err(|_| AuthError::InvalidSignature)
}

fn permits_rs256_verify(key: &PublicKeyRecord) -> bool {
    key.alg.as_deref().is_none_or(|alg| alg == "RS256")
        && key.key_use.as_deref().is_none_or(|key_use| key_use == "sig")
        && key
            .key_ops
            .as_ref()
            .is_none_or(|ops| ops.iter().any(|op| op == "verify"))
}

fn decode_component(value: Option<&str>) -> Result<Vec<u8>, AuthError> {
    let value = value.ok_or(AuthError::UnsupportedKeyType)?;
    Base64UrlUnpadded::decode_vec(value.trim_end_matches('='))
        .map_err(|_| AuthError::UnsupportedKeyType)
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
