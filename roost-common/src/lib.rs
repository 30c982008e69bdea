//! Common types and utilities shared across Roost crates.
//!
//! This crate defines the shared error type, observability helpers, and the
//! handful of enums every other crate needs. It is intentionally lightweight
//! and dependency-minimal so that all crates can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`RoostError`] and [`Result`]: Shared error handling
//! - [`StealthLevel`]: how aggressively the browser masks automation
use serde::{Deserialize, Serialize};

pub mod observability;

/// Application name used for log directories and data paths.
pub const APP_NAME: &str = "roost";

/// How aggressively a launched browser masks automation signals.
///
/// `Lightweight` only hides the webdriver property; `Balanced` additionally
/// spoofs WebGL and navigator.platform from the profile's synthesized
/// hardware identity; `Maximum` adds canvas noise on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    Balanced,
    Maximum,
}

impl Default for StealthLevel {
    fn default() -> Self {
        StealthLevel::Balanced
    }
}

/// Error types used across the Roost system.
#[derive(thiserror::Error, Debug)]
pub enum RoostError {
    /// The profile store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// A browser driver (webdriver, navigation, cookies) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced profile could not be located.
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// The roster CSV could not be read or was malformed.
    #[error("Roster error: {0}")]
    Roster(String),

    /// Operator credentials were rejected.
    #[error("Credentials rejected")]
    CredentialsRejected,
}

/// Convenient alias for results that use [`RoostError`].
pub type Result<T> = std::result::Result<T, RoostError>;
