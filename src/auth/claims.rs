// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed header and payload of an access assertion.

use serde::Deserialize;

use super::AuthError;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: i64 = 60;

/// The only signature algorithm accepted.
pub const REQUIRED_ALGORITHM: &str = "RS256";

/// Assertion header (JOSE header).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssertionHeader {
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

impl AssertionHeader {
    /// Require RS256 and a non-empty key identifier; returns the `kid`.
    ///
    /// Rejecting every other `alg` (including `none` and HMAC variants) closes
    /// off algorithm confusion.
    pub fn validate(&self) -> Result<&str, AuthError> {
        if self.alg.as_deref() != Some(REQUIRED_ALGORITHM) {
            return Err(AuthError::UnsupportedAlgorithm);
        }
        match self.kid.as_deref() {
            Some(kid) if !kid.is_empty() => Ok(kid),
            _ => Err(AuthError::MissingKeyId),
        }
    }
}

/// `aud` is either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// True if any audience entry is in the allow-list.
    pub fn matches_any(&self, allowed: &[String]) -> bool {
        match self {
            Audience::One(aud) => allowed.iter().any(|a| a == aud),
            Audience::Many(auds) => auds.iter().any(|aud| allowed.iter().any(|a| a == aud)),
        }
    }
}

/// Registered claims the validator looks at. Other claims are ignored.
///
/// Time claims are NumericDate values and may carry a fractional part.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssertionClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub nbf: Option<f64>,
    #[serde(default)]
    pub iat: Option<f64>,
}

impl AssertionClaims {
    /// Apply the time gates at `now` (unix seconds).
    ///
    /// `exp` is mandatory. `nbf` and `iat` are checked only when present.
    pub fn validate_times(&self, now: i64) -> Result<(), AuthError> {
        let now = now as f64;
        let leeway = CLOCK_SKEW_LEEWAY as f64;

        match self.exp {
            Some(exp) if exp + leeway >= now => {}
            _ => return Err(AuthError::TokenExpired),
        }
        if let Some(nbf) = self.nbf {
            if nbf - leeway > now {
                return Err(AuthError::TokenNotYetValid);
            }
        }
        if let Some(iat) = self.iat {
            if iat - leeway > now {
                return Err(AuthError::IssuedInFuture);
            }
        }
        Ok(())
    }

    /// Require at least one `aud` entry present in `allowed`.
    pub fn validate_audience(&self, allowed: &[String]) -> Result<(), AuthError> {
        match &self.aud {
            Some(aud) if aud.matches_any(allowed) => Ok(()),
            _ => Err(AuthError::InvalidAudience),
        }
    }
}
