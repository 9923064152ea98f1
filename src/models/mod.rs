// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod grove;
pub mod link;
pub mod smart_home;

pub use grove::{Grove, Plant, WateringEvent};
pub use link::{AuthorizationCode, GoogleHomeLink, LinkView};
