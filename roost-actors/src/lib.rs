//! Minimal actor runtime used to keep the TUI responsive while browsers
//! launch and the store writes.
//!
//! Each component (store, runner, TUI) runs as a single task draining a
//! bounded mailbox; the [`system::ActorSystem`] tracks the tasks and fans a
//! broadcast shutdown signal out to all of them. Wiring is static — there is
//! no registry or late binding.

pub mod actor;
pub mod system;
