//! Collaborator contracts and their persistence implementations.
//!
//! # Responsibility
//! - Define the document store and client-local storage seams the visitor
//!   services are written against.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Store errors say whether a retry can help (`StoreError::is_retryable`).

pub mod document_store;
pub mod local_storage;
pub mod memory_store;
