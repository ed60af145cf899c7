//! Patient domain model and input validation.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Normalize and validate caller input before it reaches a store.
//!
//! # Invariants
//! - Every persisted record is identified by a store-assigned `PatientId`.
//! - Records are append-only: no update or delete path exists.

pub mod patient;
pub mod validation;
