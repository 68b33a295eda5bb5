//! Cross-variant aggregation over the per-variant stores.
//!
//! # Responsibility
//! - Fan list, get and delete requests out over every store.
//! - Verify each returned row was stored under the tag of the store that
//!   produced it.
//! - Merge heterogeneous results into one rank-ordered sequence.
//!
//! # Invariants
//! - Stores are consulted one after another, in construction order.
//! - Merging is a stable sort by `order`; ties keep per-store order, then
//!   store order, so unchanged data always lists the same way.
//! - Integrity faults are logged and reported, never repaired.
//! - Deletion is not atomic across stores; each store commits on its own.

use crate::model::directory::UserId;
use crate::model::item::{AgendaItem, ItemId, ItemKind, MeetingId};
use crate::repo::item_store::{ItemStore, SqliteItemStore, StoredItem};
use crate::repo::{RepoError, RepoResult};
use log::{debug, error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio_util::sync::CancellationToken;

pub type AggregateResult<T> = Result<T, AggregateError>;

/// Aggregation failure.
#[derive(Debug)]
pub enum AggregateError {
    /// One store failed; other stores may already have run.
    Repo { kind: ItemKind, source: RepoError },
    /// A row's stored tag disagrees with the store that returned it.
    Integrity {
        item_id: ItemId,
        store: ItemKind,
        stored_type: String,
    },
    /// The same identifier is live in more than one store.
    DuplicateIdentifier { item_id: ItemId, kinds: Vec<ItemKind> },
    /// No store is registered for this variant.
    MissingStore(ItemKind),
}

impl AggregateError {
    /// Returns the underlying repository error, if any.
    pub fn repo_error(&self) -> Option<&RepoError> {
        match self {
            Self::Repo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo { kind, source } => write!(f, "{kind} store failed: {source}"),
            Self::Integrity {
                item_id,
                store,
                stored_type,
            } => write!(
                f,
                "item {item_id} returned by {store} store is stored as `{stored_type}`"
            ),
            Self::DuplicateIdentifier { item_id, kinds } => {
                let kinds = kinds
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "item {item_id} exists in several stores: {kinds}")
            }
            Self::MissingStore(kind) => write!(f, "no store registered for {kind}"),
        }
    }
}

impl Error for AggregateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Affected-row counts from one fan-out delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub total: usize,
    /// One entry per consulted store, in fan-out order.
    pub per_kind: Vec<(ItemKind, usize)>,
}

/// Stateless composer over a fixed set of stores.
pub struct ItemAggregator<S: ItemStore> {
    stores: Vec<S>,
}

impl<'conn> ItemAggregator<SqliteItemStore<'conn>> {
    /// Builds an aggregator over every SQLite variant store.
    pub fn try_sqlite(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(SqliteItemStore::try_all(conn)?))
    }
}

impl<S: ItemStore> ItemAggregator<S> {
    /// Creates an aggregator that fans out over `stores` in the given order.
    pub fn new(stores: Vec<S>) -> Self {
        Self { stores }
    }

    /// Returns the store owning `kind`.
    pub fn store_for(&self, kind: ItemKind) -> AggregateResult<&S> {
        self.stores
            .iter()
            .find(|store| store.kind() == kind)
            .ok_or(AggregateError::MissingStore(kind))
    }

    /// Lists every in-scope item of `caller`, ordered by rank.
    pub fn list_all(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
    ) -> AggregateResult<Vec<AgendaItem>> {
        self.collect_sorted(|store| store.list_by_caller(cancel, caller))
    }

    /// Lists the in-scope items of one meeting, ordered by rank.
    pub fn list_by_meeting(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        meeting_id: MeetingId,
    ) -> AggregateResult<Vec<AgendaItem>> {
        self.collect_sorted(|store| store.list_by_meeting(cancel, caller, meeting_id))
    }

    /// Returns the first store whose table already uses `id`.
    ///
    /// Unscoped and blind to soft deletion; identifiers are never reused.
    pub fn id_owner(
        &self,
        cancel: &CancellationToken,
        id: ItemId,
    ) -> AggregateResult<Option<ItemKind>> {
        for store in &self.stores {
            let held = store
                .holds_id(cancel, id)
                .map_err(|source| store_failure("item_id_check", store.kind(), source))?;
            if held {
                return Ok(Some(store.kind()));
            }
        }
        Ok(None)
    }

    /// Looks `id` up in every store.
    ///
    /// Returns `None` when no store has a visible row with this id.
    pub fn get_by_id(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> AggregateResult<Option<AgendaItem>> {
        let mut hits = Vec::new();
        for store in &self.stores {
            let found = store
                .get_by_id(cancel, caller, id)
                .map_err(|source| store_failure("item_get", store.kind(), source))?;
            if let Some(stored) = found {
                hits.push(verify(store.kind(), stored)?);
            }
        }

        if hits.len() > 1 {
            let kinds = hits.iter().map(AgendaItem::kind).collect::<Vec<_>>();
            error!(
                "event=item_get module=aggregate status=error error_code=duplicate_identifier item_id={} stores={}",
                id,
                hits.len()
            );
            return Err(AggregateError::DuplicateIdentifier { item_id: id, kinds });
        }
        Ok(hits.pop())
    }

    /// Soft-deletes `id` in every store.
    ///
    /// Every store is attempted even after one fails; the first failure is
    /// returned. Zero affected rows is success.
    pub fn delete_by_id(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> AggregateResult<DeleteReport> {
        let mut report = DeleteReport::default();
        let mut first_failure = None;

        for store in &self.stores {
            match store.soft_delete(cancel, caller, id) {
                Ok(changed) => {
                    report.total += changed;
                    report.per_kind.push((store.kind(), changed));
                }
                Err(source) => {
                    let failure = store_failure("item_delete", store.kind(), source);
                    first_failure.get_or_insert(failure);
                }
            }
        }

        if let Some(failure) = first_failure {
            return Err(failure);
        }

        info!(
            "event=item_delete module=aggregate status=ok item_id={} affected={}",
            id, report.total
        );
        Ok(report)
    }

    fn collect_sorted<F>(&self, mut fetch: F) -> AggregateResult<Vec<AgendaItem>>
    where
        F: FnMut(&S) -> RepoResult<Vec<StoredItem>>,
    {
        let mut items = Vec::new();
        for store in &self.stores {
            let rows = fetch(store)
                .map_err(|source| store_failure("item_list", store.kind(), source))?;
            debug!(
                "event=item_list module=aggregate status=ok kind={} rows={}",
                store.kind(),
                rows.len()
            );
            for stored in rows {
                items.push(verify(store.kind(), stored)?);
            }
        }

        items.sort_by_key(|item| item.order);
        Ok(items)
    }
}

/// Checks that `stored` really belongs to the `store` that returned it.
fn verify(store: ItemKind, stored: StoredItem) -> AggregateResult<AgendaItem> {
    if stored.stored_type == store.as_str() && stored.item.kind() == store {
        return Ok(stored.item);
    }

    error!(
        "event=item_integrity module=aggregate status=error error_code=kind_mismatch item_id={} store={} stored_type={}",
        stored.item.id, store, stored.stored_type
    );
    Err(AggregateError::Integrity {
        item_id: stored.item.id,
        store,
        stored_type: stored.stored_type,
    })
}

fn store_failure(event: &'static str, kind: ItemKind, source: RepoError) -> AggregateError {
    if matches!(source, RepoError::Cancelled) {
        debug!("event={event} module=aggregate status=cancelled kind={kind}");
    } else {
        error!("event={event} module=aggregate status=error kind={kind} error={source}");
    }
    AggregateError::Repo { kind, source }
}
