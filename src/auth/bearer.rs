// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared-secret bearer authentication.
//!
//! The caller presents `Authorization: Bearer <secret>`. The comparison is
//! constant-time over the full length once lengths match, so timing only
//! reveals whether the lengths are equal.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use subtle::ConstantTimeEq;

use super::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer credential from the `Authorization` header.
///
/// Returns `None` when the header is absent, not valid header text, lacks the
/// literal `Bearer ` prefix, or carries an empty credential.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(candidate: &str, expected: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Check the request's bearer credential against the configured secret.
///
/// An absent or blank secret disables this path entirely.
pub fn check_bearer(headers: &HeaderMap, expected_secret: Option<&str>) -> Result<(), AuthError> {
    let expected = match expected_secret {
        Some(secret) if !secret.trim().is_empty() => secret,
        _ => return Err(AuthError::NotConfigured),
    };
    let credential = extract_bearer(headers).ok_or(AuthError::MissingCredential)?;
    if constant_time_eq(credential, expected) {
        Ok(())
    } else {
        Err(AuthError::CredentialMismatch)
    }
}

/// Boolean verdict for the bearer path.
pub fn is_secret_authorized(headers: &HeaderMap, expected_secret: Option<&str>) -> bool {
    check_bearer(headers, expected_secret).is_ok()
}
