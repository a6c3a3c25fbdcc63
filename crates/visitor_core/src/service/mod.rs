//! Visitor use-case services.
//!
//! # Responsibility
//! - Orchestrate collaborator calls into the page's visitor operations.
//! - Keep the page decoupled from storage details and failure modes.

pub mod error;
pub mod tracker;
pub mod visit_marker;
pub mod visitor_counter;
