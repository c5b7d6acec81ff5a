// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{HttpKeySetFetcher, RequestAuthorizer};

pub struct AppState<F = HttpKeySetFetcher> {
    pub authorizer: Arc<RequestAuthorizer<F>>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<F> AppState<F> {
    pub fn new(authorizer: RequestAuthorizer<F>) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
        }
    }
}
