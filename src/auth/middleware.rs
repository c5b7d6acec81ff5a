// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authorization decision and its Axum middleware.
//!
//! The bearer secret is checked first since it needs no I/O. Only when it
//! fails is the access assertion validated. Either success authorizes the
//! request; every failure, whatever the cause, is the same 401.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::access::AccessValidator;
use super::bearer::check_bearer;
use super::jwks::KeySetFetcher;
use crate::error::ApiError;

/// How a request was authorized.
///
/// Inserted into request extensions by [`authorize_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    BearerToken,
    AccessAssertion,
}

/// Combines the bearer and access-assertion paths into one verdict.
pub struct RequestAuthorizer<F> {
    api_token: Option<String>,
    access: AccessValidator<F>,
}

impl<F: KeySetFetcher> RequestAuthorizer<F> {
    pub fn new(api_token: Option<String>, access: AccessValidator<F>) -> Self {
        Self { api_token, access }
    }

    /// Whether a non-blank bearer secret is configured.
    pub fn bearer_configured(&self) -> bool {
        self.api_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }

    pub fn access(&self) -> &AccessValidator<F> {
        &self.access
    }

    /// Decide which method, if any, authorizes these headers.
    pub async fn authorize(&self, headers: &HeaderMap) -> Option<AuthMethod> {
        match check_bearer(headers, self.api_token.as_deref()) {
            Ok(()) => return Some(AuthMethod::BearerToken),
            Err(e) => tracing::debug!(reason = e.reason(), "Bearer authentication failed"),
        }

        match self.access.validate(headers).await {
            Ok(()) => Some(AuthMethod::AccessAssertion),
            Err(e) => {
                tracing::debug!(reason = e.reason(), "Access assertion rejected");
                None
            }
        }
    }

    /// Boolean verdict for a request.
    pub async fn is_request_authorized(&self, headers: &HeaderMap) -> bool {
        self.authorize(headers).await.is_some()
    }
}

/// Axum middleware rejecting unauthorized requests with a fixed 401 body.
///
/// # Usage
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/admin/session", get(session))
///     .route_layer(axum::middleware::from_fn_with_state(
///         authorizer.clone(),
///         authorize_request::<HttpKeySetFetcher>,
///     ));
/// ```
pub async fn authorize_request<F: KeySetFetcher + 'static>(
    State(authorizer): State<Arc<RequestAuthorizer<F>>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authorizer.authorize(request.headers()).await {
        Some(method) => {
            request.extensions_mut().insert(method);
            next.run(request).await
        }
        None => ApiError::unauthorized().into_response(),
    }
}
