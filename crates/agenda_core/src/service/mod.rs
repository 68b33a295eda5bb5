//! Agenda-item use-case services.
//!
//! # Responsibility
//! - Compose the per-variant stores into cross-variant operations.
//! - Expose the only API outer layers use for agenda items.

pub mod aggregate;
pub mod item_service;
