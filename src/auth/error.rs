// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication failure reasons.
//!
//! These are internal: every variant collapses to the same unauthorized
//! verdict at the crate boundary. They exist so the failing gate can be
//! logged with a stable code.

/// Why a request failed to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Path has no configuration (no secret, empty audience list)
    #[error("authentication method is not configured")]
    NotConfigured,
    /// Credential header absent or without the expected prefix
    #[error("credential header is missing")]
    MissingCredential,
    /// Bearer credential does not match the configured secret
    #[error("bearer credential does not match")]
    CredentialMismatch,
    /// Assertion is not three decodable segments
    #[error("assertion is malformed")]
    MalformedToken,
    /// Header `alg` is anything other than RS256
    #[error("assertion algorithm is not supported")]
    UnsupportedAlgorithm,
    /// Header has no usable `kid`
    #[error("assertion has no key identifier")]
    MissingKeyId,
    /// `exp` missing or in the past beyond the skew tolerance
    #[error("assertion has expired")]
    TokenExpired,
    /// `nbf` in the future beyond the skew tolerance
    #[error("assertion is not yet valid")]
    TokenNotYetValid,
    /// `iat` in the future beyond the skew tolerance
    #[error("assertion was issued in the future")]
    IssuedInFuture,
    /// No `aud` entry is in the allow-list
    #[error("assertion audience is not allowed")]
    InvalidAudience,
    /// `iss` is not a trusted HTTPS origin
    #[error("assertion issuer is not trusted")]
    InvalidIssuer,
    /// `kid` not in the issuer's key set, even after a refresh
    #[error("no matching key in issuer key set")]
    NoMatchingKey,
    /// Matched key is not an RSA key or lacks its components
    #[error("key type is not supported")]
    UnsupportedKeyType,
    /// Signature does not verify
    #[error("assertion signature is invalid")]
    InvalidSignature,
}

impl AuthError {
    /// Stable code for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotConfigured => "not_configured",
            AuthError::MissingCredential => "missing_credential",
            AuthError::CredentialMismatch => "credential_mismatch",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::MissingKeyId => "missing_kid",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::IssuedInFuture => "issued_in_future",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::UnsupportedKeyType => "unsupported_key_type",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }
}
