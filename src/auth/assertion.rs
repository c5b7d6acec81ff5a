// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural parsing of a compact-serialized access assertion.
//!
//! `header.payload.signature`, each segment base64url without padding. The
//! signed bytes are the first two segments exactly as received, so they are
//! kept verbatim rather than re-encoded.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;

use super::claims::{AssertionClaims, AssertionHeader};
use super::AuthError;

/// A decoded assertion. Built once per verification attempt.
#[derive(Debug, Clone)]
pub struct ParsedAssertion {
    pub header: AssertionHeader,
    pub claims: AssertionClaims,
    pub signature: Vec<u8>,
    /// `<header>.<payload>` as received.
    pub signing_input: String,
}

impl ParsedAssertion {
    /// Split, decode and deserialize all three segments.
    ///
    /// Any missing segment, bad base64, non-object JSON or mistyped claim
    /// invalidates the whole assertion.
    pub fn parse(token: &str) -> Result<Self, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };
        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        let header = decode_json_segment(header_b64)?;
        let claims = decode_json_segment(payload_b64)?;
        let signature = decode_segment(signature_b64)?;

        Ok(Self {
            header,
            claims,
            signature,
            signing_input: format!("{header_b64}.{payload_b64}"),
        })
    }
}

/// Decode one base64url segment, tolerating trailing `=` padding.
///
/// Decoding is strict otherwise: the standard alphabet's `+` and `/` and
/// non-zero trailing bits in the last character are malformed.
fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    Base64UrlUnpadded::decode_vec(segment.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)
}

fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = decode_segment(segment)?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;
    if !value.is_object() {
        return Err(AuthError::MalformedToken);
    }
    serde_json::from_value(value).map_err(|_| AuthError::MalformedToken)
}
