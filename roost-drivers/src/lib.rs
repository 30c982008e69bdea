//! Driver layer for launching and resuming browser sessions.
//!
//! - [`roost_browser::driver::RoostDriver`]: WebDriver client wrapper with
//!   cookie restore/capture
//! - [`roost_browser::fingerprint`]: synthesized per-profile identities
//! - [`roost_browser::stealth`]: Chrome arguments and JS evasions
//! - [`roost_browser::process`]: stray chrome cleanup between profiles
pub mod roost_browser;
