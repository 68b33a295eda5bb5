//! Authorization scope: which meetings a caller may see.
//!
//! # Responsibility
//! - Resolve an external social identity to an active internal user.
//! - Own the single SQL predicate (`AUTHORIZED_MEETINGS_CTE`) every agenda-item
//!   read and scoped write is filtered through.
//!
//! # Invariants
//! - A meeting is in scope only when the user, the membership, the
//!   organization and the meeting all have `deleted_at IS NULL`.
//! - Item rows are never touched to revoke access; a soft-deleted ancestor
//!   hides them.
//! - The caller's user id is always bound as `?1` in scoped statements.

use crate::model::directory::UserId;
use crate::model::item::MeetingId;
use crate::repo::{arm_cancel, ensure_active, ensure_connection_ready, parse_uuid, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;

/// Common table expression named `authorized_meetings(meeting_id)`.
///
/// Prefix a statement with it and filter with
/// `meeting_id IN (SELECT meeting_id FROM authorized_meetings)`.
pub const AUTHORIZED_MEETINGS_CTE: &str = "WITH authorized_meetings AS (
    SELECT m.id AS meeting_id
    FROM org_users ou
    INNER JOIN users u
        ON u.id = ou.user_id
        AND u.deleted_at IS NULL
    INNER JOIN organizations o
        ON o.id = ou.org_id
        AND o.deleted_at IS NULL
    INNER JOIN meetings m
        ON m.org_id = ou.org_id
        AND m.deleted_at IS NULL
    WHERE ou.user_id = ?1
        AND ou.deleted_at IS NULL
)";

/// Filter clause matching rows whose `meeting_id` is in scope.
pub const IN_AUTHORIZED_MEETINGS: &str =
    "meeting_id IN (SELECT meeting_id FROM authorized_meetings)";

/// Prefixes `statement` with the authorization CTE.
pub fn scoped(statement: &str) -> String {
    format!("{AUTHORIZED_MEETINGS_CTE}\n{statement}")
}

/// Resolves callers and answers scope questions for the service layer.
pub struct ScopeResolver<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ScopeResolver<'conn> {
    /// Creates a resolver from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("users", &["id", "social_id", "deleted_at"]),
                ("organizations", &["id", "deleted_at"]),
                ("org_users", &["org_id", "user_id", "deleted_at"]),
                ("meetings", &["id", "org_id", "deleted_at"]),
            ],
        )?;
        Ok(Self { conn })
    }

    /// Maps a social identity to an active user id.
    ///
    /// Returns `None` for unknown or soft-deleted users.
    pub fn resolve_caller(
        &self,
        cancel: &CancellationToken,
        social_id: &str,
    ) -> RepoResult<Option<UserId>> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let id_text: Option<String> = self
            .conn
            .query_row(
                "SELECT id
                 FROM users
                 WHERE social_id = ?1
                   AND deleted_at IS NULL;",
                [social_id],
                |row| row.get(0),
            )
            .optional()?;

        id_text
            .map(|text| parse_uuid(&text, "users.id"))
            .transpose()
    }

    /// Lists every meeting id the caller can currently see, sorted by id.
    pub fn authorized_meeting_ids(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
    ) -> RepoResult<Vec<MeetingId>> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let mut stmt = self.conn.prepare(&scoped(
            "SELECT DISTINCT meeting_id FROM authorized_meetings ORDER BY meeting_id ASC;",
        ))?;
        let mut rows = stmt.query([caller.to_string()])?;
        let mut meetings = Vec::new();
        while let Some(row) = rows.next()? {
            ensure_active(cancel)?;
            let text: String = row.get(0)?;
            meetings.push(parse_uuid(&text, "meetings.id")?);
        }
        Ok(meetings)
    }

    /// Returns whether `meeting_id` is in the caller's scope.
    pub fn meeting_in_scope(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        meeting_id: MeetingId,
    ) -> RepoResult<bool> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let exists: i64 = self.conn.query_row(
            &scoped(
                "SELECT EXISTS(
                    SELECT 1 FROM authorized_meetings WHERE meeting_id = ?2
                );",
            ),
            params![caller.to_string(), meeting_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
