// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Endpoints behind the authorization middleware.

use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthMethod;

/// Describes the caller's authorization.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authorized: bool,
    pub method: AuthMethod,
    pub timestamp: String,
}

/// Report how the current request was authorized.
pub async fn session(Extension(method): Extension<AuthMethod>) -> Json<SessionResponse> {
    Json(SessionResponse {
        authorized: true,
        method,
        timestamp: Utc::now().to_rfc3339(),
    })
}
