//! Domain model for meetings and their agenda items.
//!
//! # Responsibility
//! - Define the closed agenda-item sum type shared by decoder, stores and
//!   services.
//! - Define the directory records that make up the authorization chain.
//! - Define the hymn catalog lyrics items refer to.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Deletion is represented by soft-delete timestamps, never hard delete.

pub mod directory;
pub mod hymn;
pub mod item;
