//! Core persistence engine for meeting agenda items.
//! Stores a closed set of item variants in per-variant tables, scoped by
//! organization membership, and merges them back into one ordered sequence.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod wire;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::directory::{Meeting, OrgId, Organization, User, UserId};
pub use model::hymn::{Hymn, HymnId, HymnVerse};
pub use model::item::{
    AgendaItem, ItemContent, ItemId, ItemKind, ItemValidationError, LyricsContent, MeetingId,
    MessageContent, SpeakerContent, TimerContent,
};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::hymn_repo::{HymnRepository, SqliteHymnRepository};
pub use repo::item_store::{ItemStore, SqliteItemStore, StoredItem};
pub use repo::scope::ScopeResolver;
pub use repo::{RepoError, RepoResult};
pub use service::aggregate::{AggregateError, DeleteReport, ItemAggregator};
pub use service::item_service::{
    CallerContext, ErrorClass, ItemService, ServiceError, ServiceResult,
};
pub use tokio_util::sync::CancellationToken;
pub use wire::{decode_item, encode_item, encode_items, DecodeError, ItemPayload};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
