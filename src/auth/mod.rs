// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Every guarded request is authorized by exactly one of two methods:
//!
//! 1. `Authorization: Bearer <API_TOKEN>`, compared in constant time
//! 2. `Cf-Access-Jwt-Assertion: <JWT>` issued by Cloudflare Access:
//!    - RS256 only, `kid` required
//!    - `exp` mandatory; `exp`/`nbf`/`iat` checked with 60 seconds of skew
//!    - `aud` must intersect the configured allow-list
//!    - `iss` must be `https://<team>.cloudflareaccess.com`
//!    - signature verified against the issuer's cached JWKS
//!
//! ## Security
//!
//! - Unconfigured methods fail closed
//! - Callers only ever see a yes/no verdict; the failing gate is logged at
//!   debug level and never returned
//! - JWKS is fetched only from the normalized issuer origin

pub mod access;
pub mod assertion;
pub mod bearer;
pub mod claims;
pub mod clock;
pub mod error;
pub mod issuer;
pub mod jwks;
pub mod middleware;

pub use access::{AccessValidator, ACCESS_ASSERTION_HEADER};
pub use bearer::is_secret_authorized;
pub use clock::{Clock, SystemClock};
pub use error::AuthError;
pub use jwks::{HttpKeySetFetcher, KeySetCache, KeySetFetcher};
pub use middleware::{authorize_request, AuthMethod, RequestAuthorizer};
