//! Domain model for the visitor counter.
//!
//! # Responsibility
//! - Define document addressing and snapshot shapes shared by all stores.
//! - Define the counter record and its fixed identity.
//!
//! # Invariants
//! - The counter lives at exactly one `DocumentRef`.
//! - `count` never decreases.

pub mod counter;
pub mod document;
