//! Batch processing of browser profiles.
//!
//! - [`roster`]: the CSV-loaded list of profiles to work through
//! - [`gate`]: operator credential verification before a batch starts
//! - [`runner`]: the actor that walks the roster, one browser at a time
pub mod gate;
pub mod roster;
pub mod runner;

pub use gate::CredentialGate;
pub use roster::{Roster, RosterEntry};
pub use runner::{RunnerActor, RunnerEvent, RunnerMsg};
