// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware, routing::get, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{authorize_request, KeySetFetcher},
    state::AppState,
};

pub mod admin;
pub mod health;

pub fn router<F: KeySetFetcher + 'static>(state: AppState<F>) -> Router {
    let admin_routes = Router::new()
        .route("/session", get(admin::session))
        .route_layer(middleware::from_fn_with_state(
            state.authorizer.clone(),
            authorize_request::<F>,
        ));

    Router::new()
        .route("/health", get(health::health::<F>))
        .route("/health/live", get(health::liveness))
        .nest("/admin", admin_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
