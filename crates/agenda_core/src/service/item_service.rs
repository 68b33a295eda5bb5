//! Agenda-item use-case service.
//!
//! # Responsibility
//! - Be the single entry point outer layers call for agenda items.
//! - Resolve the caller, decode payloads and route writes to the store that
//!   owns the item's variant.
//! - Map every lower-layer failure onto one `ServiceError` with a class.
//!
//! # Invariants
//! - Every operation resolves the caller first; unknown callers never reach
//!   a store.
//! - Create only targets meetings in the caller's scope.
//! - An item id is unique across every variant table.
//! - Update resolves ownership through `get_by_id` before writing and never
//!   changes an item's variant.
//! - Reads conflate missing, soft-deleted and unauthorized items.

use crate::db::DbError;
use crate::model::directory::UserId;
use crate::model::item::{AgendaItem, ItemId, ItemKind, ItemValidationError, MeetingId};
use crate::repo::item_store::{ItemStore, SqliteItemStore};
use crate::repo::scope::ScopeResolver;
use crate::repo::{RepoError, RepoResult};
use crate::service::aggregate::{AggregateError, DeleteReport, ItemAggregator};
use crate::wire::{decode_item, DecodeError};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse error category for outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientFault,
    NotFound,
    Conflict,
    Integrity,
    Cancelled,
    Internal,
}

/// Service error for agenda-item use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Social id does not map to an active user.
    UnknownCaller,
    Decode(DecodeError),
    Validation(ItemValidationError),
    /// Payload id differs from the id addressed by the request.
    IdMismatch { path: ItemId, payload: ItemId },
    /// Update tried to turn an item into another variant.
    KindChange {
        id: ItemId,
        stored: ItemKind,
        requested: ItemKind,
    },
    /// Item is missing, soft-deleted or outside the caller's scope.
    NotFound(ItemId),
    /// Target meeting is missing, soft-deleted or outside the caller's scope.
    MeetingNotFound(MeetingId),
    AlreadyExists(ItemId),
    NoRowsAffected(ItemId),
    Integrity(AggregateError),
    Cancelled,
    /// Backing-store failure passed through opaquely.
    Repo(RepoError),
    /// Aggregation failure not covered by a more specific variant.
    Aggregate(AggregateError),
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Decode(_)
            | Self::Validation(_)
            | Self::IdMismatch { .. }
            | Self::KindChange { .. }
            | Self::NoRowsAffected(_) => ErrorClass::ClientFault,
            Self::UnknownCaller | Self::NotFound(_) | Self::MeetingNotFound(_) => {
                ErrorClass::NotFound
            }
            Self::AlreadyExists(_) => ErrorClass::Conflict,
            Self::Integrity(_) => ErrorClass::Integrity,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Repo(_) | Self::Aggregate(_) => ErrorClass::Internal,
        }
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCaller => "unknown_caller",
            Self::Decode(DecodeError::UnknownKind(_)) => "unknown_kind",
            Self::Decode(_) => "decode_failed",
            Self::Validation(_) => "invalid_item",
            Self::IdMismatch { .. } => "id_mismatch",
            Self::KindChange { .. } => "kind_change",
            Self::NotFound(_) => "item_not_found",
            Self::MeetingNotFound(_) => "meeting_not_found",
            Self::AlreadyExists(_) => "item_exists",
            Self::NoRowsAffected(_) => "no_rows_affected",
            Self::Integrity(_) => "integrity",
            Self::Cancelled => "cancelled",
            Self::Repo(_) | Self::Aggregate(_) => "internal",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCaller => write!(f, "caller is not a known active user"),
            Self::Decode(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::IdMismatch { path, payload } => {
                write!(f, "payload id {payload} does not match request id {path}")
            }
            Self::KindChange {
                id,
                stored,
                requested,
            } => write!(f, "item {id} is a {stored} item and cannot become {requested}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::MeetingNotFound(id) => write!(f, "meeting not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "item already exists: {id}"),
            Self::NoRowsAffected(id) => write!(f, "no item updated for id {id}"),
            Self::Integrity(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Aggregate(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Integrity(err) | Self::Aggregate(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for ServiceError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::AlreadyExists(id) => Self::AlreadyExists(id),
            RepoError::NoRowsAffected(id) => Self::NoRowsAffected(id),
            RepoError::Cancelled => Self::Cancelled,
            other => Self::Repo(other),
        }
    }
}

impl From<AggregateError> for ServiceError {
    fn from(value: AggregateError) -> Self {
        match value {
            AggregateError::Repo { source, .. } => source.into(),
            AggregateError::Integrity { .. } | AggregateError::DuplicateIdentifier { .. } => {
                Self::Integrity(value)
            }
            AggregateError::MissingStore(_) => Self::Aggregate(value),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

/// Authenticated caller of one request.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// External identity asserted by the outer auth layer.
    pub social_id: String,
    /// Cancelled by the outer layer when the request is abandoned.
    pub cancel: CancellationToken,
}

impl CallerContext {
    pub fn new(social_id: impl Into<String>) -> Self {
        Self::with_cancel(social_id, CancellationToken::new())
    }

    pub fn with_cancel(social_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            social_id: social_id.into(),
            cancel,
        }
    }
}

/// Agenda-item service facade over scope resolution and aggregation.
pub struct ItemService<'conn, S: ItemStore> {
    scope: ScopeResolver<'conn>,
    items: ItemAggregator<S>,
}

impl<'conn> ItemService<'conn, SqliteItemStore<'conn>> {
    /// Builds a service backed by the SQLite stores on `conn`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            ScopeResolver::try_new(conn)?,
            ItemAggregator::try_sqlite(conn)?,
        ))
    }
}

impl<'conn, S: ItemStore> ItemService<'conn, S> {
    /// Creates a service from explicit collaborators.
    pub fn new(scope: ScopeResolver<'conn>, items: ItemAggregator<S>) -> Self {
        Self { scope, items }
    }

    /// Decodes `raw` and stores it as a new item in one of the caller's meetings.
    ///
    /// A missing id is generated. A meeting outside scope yields
    /// `MeetingNotFound`. An id already used by any variant, live or
    /// soft-deleted, yields `AlreadyExists`.
    pub fn create(&self, caller: &CallerContext, raw: &[u8]) -> ServiceResult<AgendaItem> {
        observe("item_create", || {
            let user = self.resolve(caller)?;
            let item = decode_item(raw)?.into_item_or(Uuid::new_v4);
            item.validate().map_err(ServiceError::Validation)?;

            if !self
                .scope
                .meeting_in_scope(&caller.cancel, user, item.meeting_id)?
            {
                return Err(ServiceError::MeetingNotFound(item.meeting_id));
            }

            if let Some(owner) = self.items.id_owner(&caller.cancel, item.id)? {
                debug!(
                    "event=item_create module=service status=conflict item_id={} held_by={owner}",
                    item.id
                );
                return Err(ServiceError::AlreadyExists(item.id));
            }

            self.items
                .store_for(item.kind())?
                .create(&caller.cancel, &item)?;
            debug!(
                "event=item_create module=service status=stored kind={} item_id={} meeting_id={}",
                item.kind(),
                item.id,
                item.meeting_id
            );
            Ok(item)
        })
    }

    /// Gets one visible item by id.
    pub fn get(&self, caller: &CallerContext, id: ItemId) -> ServiceResult<AgendaItem> {
        observe("item_get", || {
            let user = self.resolve(caller)?;
            self.items
                .get_by_id(&caller.cancel, user, id)?
                .ok_or(ServiceError::NotFound(id))
        })
    }

    /// Lists every item visible to the caller, ordered by rank.
    pub fn list(&self, caller: &CallerContext) -> ServiceResult<Vec<AgendaItem>> {
        observe("item_list", || {
            let user = self.resolve(caller)?;
            Ok(self.items.list_all(&caller.cancel, user)?)
        })
    }

    /// Lists the visible items of one meeting, ordered by rank.
    ///
    /// An unknown or unauthorized meeting lists as empty.
    pub fn list_by_meeting(
        &self,
        caller: &CallerContext,
        meeting_id: MeetingId,
    ) -> ServiceResult<Vec<AgendaItem>> {
        observe("item_list_by_meeting", || {
            let user = self.resolve(caller)?;
            Ok(self
                .items
                .list_by_meeting(&caller.cancel, user, meeting_id)?)
        })
    }

    /// Replaces item `id` with the decoded payload.
    pub fn update(
        &self,
        caller: &CallerContext,
        id: ItemId,
        raw: &[u8],
    ) -> ServiceResult<AgendaItem> {
        observe("item_update", || {
            let user = self.resolve(caller)?;
            let payload = decode_item(raw)?;
            if let Some(payload_id) = payload.id {
                if payload_id != id {
                    return Err(ServiceError::IdMismatch {
                        path: id,
                        payload: payload_id,
                    });
                }
            }
            let item = payload.into_item_or(|| id);
            item.validate().map_err(ServiceError::Validation)?;

            let current = self
                .items
                .get_by_id(&caller.cancel, user, id)?
                .ok_or(ServiceError::NotFound(id))?;
            if current.kind() != item.kind() {
                return Err(ServiceError::KindChange {
                    id,
                    stored: current.kind(),
                    requested: item.kind(),
                });
            }
            if current.meeting_id != item.meeting_id
                && !self
                    .scope
                    .meeting_in_scope(&caller.cancel, user, item.meeting_id)?
            {
                return Err(ServiceError::MeetingNotFound(item.meeting_id));
            }

            self.items
                .store_for(item.kind())?
                .update(&caller.cancel, id, &item)?;
            Ok(item)
        })
    }

    /// Soft-deletes item `id` wherever the caller can see it.
    ///
    /// Deleting a missing or already deleted item succeeds with a zero total.
    pub fn delete(&self, caller: &CallerContext, id: ItemId) -> ServiceResult<DeleteReport> {
        observe("item_delete", || {
            let user = self.resolve(caller)?;
            Ok(self.items.delete_by_id(&caller.cancel, user, id)?)
        })
    }

    fn resolve(&self, caller: &CallerContext) -> ServiceResult<UserId> {
        self.scope
            .resolve_caller(&caller.cancel, &caller.social_id)?
            .ok_or(ServiceError::UnknownCaller)
    }
}

/// Runs one service operation with start/ok/error log events.
fn observe<T>(event: &'static str, op: impl FnOnce() -> ServiceResult<T>) -> ServiceResult<T> {
    let started_at = Instant::now();
    debug!("event={event} module=service status=start");

    let result = op();
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event={event} module=service status=ok duration_ms={duration_ms}"),
        Err(err) => match err.class() {
            ErrorClass::Integrity | ErrorClass::Internal => error!(
                "event={event} module=service status=error duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            ),
            _ => warn!(
                "event={event} module=service status=error duration_ms={duration_ms} error_code={}",
                err.code()
            ),
        },
    }
    result
}
