//! rollcall-roster — the static identity list and the reference store.
//!
//! The roster is read once from TOML; the store is built once at startup by
//! fetching each member's photo and enrolling the first face found in it.
//! After that the store is immutable for the life of the process.

pub mod config;
pub mod store;

pub use config::{Roster, RosterError, RosterMember};
pub use store::ReferenceStore;
