// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::KeySetFetcher;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub auth: AuthChecks,
}

/// Which authentication methods are usable.
#[derive(Debug, Serialize)]
pub struct AuthChecks {
    /// Bearer token ("configured" or "disabled").
    pub bearer: String,
    /// Cloudflare Access ("configured" or "disabled").
    pub access: String,
    /// JWKS fetches that failed since start. A rising count during key
    /// rotation means Access logins are being denied.
    pub key_fetch_failures: u64,
}

/// Liveness probe response.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: String,
}

fn describe(configured: bool) -> String {
    let state = if configured { "configured" } else { "disabled" };
    state.to_string()
}

/// Health check endpoint handler.
///
/// Always 200; reports authentication configuration without revealing any of it.
pub async fn health<F: KeySetFetcher + 'static>(
    State(state): State<AppState<F>>,
) -> Json<HealthResponse> {
    let authorizer = &state.authorizer;
    Json(HealthResponse {
        status: "ok".to_string(),
        auth: AuthChecks {
            bearer: describe(authorizer.bearer_configured()),
            access: describe(authorizer.access().is_configured()),
            key_fetch_failures: authorizer.access().key_cache().fetch_failures(),
        },
    })
}

/// Liveness probe handler.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok".to_string(),
    })
}
