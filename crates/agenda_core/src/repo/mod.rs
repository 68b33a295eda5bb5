//! Repository layer: SQLite persistence for directory rows and agenda items.
//!
//! # Responsibility
//! - Define the error taxonomy shared by every repository.
//! - Isolate SQL details from aggregation and service orchestration.
//! - Verify a connection is migrated before any repository uses it.
//!
//! # Invariants
//! - Writes validate the record before SQL mutation.
//! - Primary-key collisions surface as `AlreadyExists`, not as raw SQLite errors.
//! - Every operation checks its cancellation token before touching SQLite and
//!   arms an interrupt so a statement already running stops once it fires.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::item::{ItemKind, ItemValidationError};
use rusqlite::{ffi, Connection, ErrorCode};
use std::ffi::c_int;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod directory_repo;
pub mod hymn_repo;
pub mod item_store;
pub mod scope;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    /// Insert hit an existing primary key.
    AlreadyExists(Uuid),
    /// Update matched no active row with this id.
    NoRowsAffected(Uuid),
    /// Item handed to a store that owns another variant.
    WrongStore {
        store: ItemKind,
        item: ItemKind,
    },
    /// Persisted row cannot be converted into a valid record.
    InvalidData(String),
    /// Caller cancelled the request before or during the operation.
    Cancelled,
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::AlreadyExists(id) => write!(f, "record already exists: {id}"),
            Self::NoRowsAffected(id) => write!(f, "no rows affected for id {id}"),
            Self::WrongStore { store, item } => {
                write!(f, "{store} store cannot persist a {item} item")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            return Self::Cancelled;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fails with `RepoError::Cancelled` once the caller gave up on the request.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> RepoResult<()> {
    if cancel.is_cancelled() {
        Err(RepoError::Cancelled)
    } else {
        Ok(())
    }
}

/// Virtual-machine steps between two cancellation polls.
const CANCEL_POLL_OPS: c_int = 1_000;

/// Interrupts statements on one connection once its token is cancelled.
///
/// SQLite reports the interrupt as `OperationInterrupted`, which converts to
/// `RepoError::Cancelled`. The handler is removed on drop.
pub(crate) struct CancelGuard<'conn> {
    conn: &'conn Connection,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

/// Fails fast on a cancelled token, otherwise arms a `CancelGuard` for the
/// statements that follow.
pub(crate) fn arm_cancel<'conn>(
    conn: &'conn Connection,
    cancel: &CancellationToken,
) -> RepoResult<CancelGuard<'conn>> {
    ensure_active(cancel)?;
    let token = cancel.clone();
    conn.progress_handler(CANCEL_POLL_OPS, Some(move || token.is_cancelled()));
    Ok(CancelGuard { conn })
}

/// Maps a failed insert to `AlreadyExists` when it tripped a key constraint.
pub(crate) fn insert_error(err: rusqlite::Error, id: Uuid) -> RepoError {
    let is_key_collision = matches!(
        &err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == ErrorCode::ConstraintViolation
                && matches!(
                    code.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                )
    );
    if is_key_collision {
        RepoError::AlreadyExists(id)
    } else {
        err.into()
    }
}

/// Rejects blank values for required text columns.
pub(crate) fn require_text(column: &'static str, value: &str) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::InvalidData(format!("{column} must not be empty")));
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

/// Checks schema version, tables and columns a repository depends on.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[(&'static str, &[&'static str])],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
