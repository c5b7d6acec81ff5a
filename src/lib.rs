// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access Gate - request authorization for administrative endpoints
//!
//! A request is authorized by a shared bearer secret or by a Cloudflare
//! Access signed assertion. The crate yields a yes/no verdict; the HTTP
//! layer turns "no" into a fixed 401.
//!
//! ## Modules
//!
//! - `auth` - Bearer comparison, assertion validation, JWKS cache, middleware
//! - `api` - HTTP router and handlers (Axum)
//! - `config` - Environment-driven settings
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
