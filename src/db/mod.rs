// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Google Home link records (keyed by user ID)
    pub const LINKS: &str = "google_home_links";
    /// Pending OAuth authorization codes (keyed by code)
    pub const AUTH_CODES: &str = "google_home_auth_codes";
    pub const GROVES: &str = "groves";
    pub const PLANTS: &str = "plants";
    /// Watering event log (shared with the main app)
    pub const WATERINGS: &str = "waterings";
}
