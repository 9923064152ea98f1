// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod devices;
pub mod homegraph;
pub mod oauth;

pub use devices::DeviceService;
pub use homegraph::HomeGraphService;
pub use oauth::{OAuthError, OAuthService, TokenResponse};
