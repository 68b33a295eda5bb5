//! Directory repository: users, organizations, memberships and meetings.
//!
//! # Responsibility
//! - Persist the rows that make up the authorization chain.
//! - Soft-delete any hop of the chain without touching agenda-item rows.
//!
//! # Invariants
//! - Soft-deleted rows are never returned by reads.
//! - Re-adding a removed membership reactivates the existing row.
//! - `meetings_for_user` and `organizations_for_user` use the same scope
//!   chain as agenda-item reads.
//! - Updates never change a row's id and never revive a soft-deleted row.

use crate::model::directory::{Meeting, OrgId, Organization, User, UserId};
use crate::model::item::MeetingId;
use crate::repo::scope::scoped;
use crate::repo::{
    ensure_connection_ready, insert_error, parse_uuid, require_text, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

/// Repository interface for directory rows.
pub trait DirectoryRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    /// Gets one active user by external identity.
    fn get_user_by_social_id(&self, social_id: &str) -> RepoResult<Option<User>>;
    /// Replaces the profile columns of one active user.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn soft_delete_user(&self, id: UserId) -> RepoResult<()>;
    fn create_organization(&self, org: &Organization) -> RepoResult<OrgId>;
    fn update_organization(&self, org: &Organization) -> RepoResult<()>;
    fn soft_delete_organization(&self, id: OrgId) -> RepoResult<()>;
    /// Lists active organizations `user_id` is an active member of, by name.
    fn organizations_for_user(&self, user_id: UserId) -> RepoResult<Vec<Organization>>;
    /// Adds `user_id` to `org_id`, reactivating a previously removed membership.
    fn add_member(&self, org_id: OrgId, user_id: UserId) -> RepoResult<()>;
    fn remove_member(&self, org_id: OrgId, user_id: UserId) -> RepoResult<()>;
    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId>;
    /// Gets one active meeting by id, without scope checks.
    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>>;
    fn update_meeting(&self, meeting: &Meeting) -> RepoResult<()>;
    fn soft_delete_meeting(&self, id: MeetingId) -> RepoResult<()>;
    /// Lists meetings visible to `user_id`, ordered by date then id.
    fn meetings_for_user(&self, user_id: UserId) -> RepoResult<Vec<Meeting>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("users", &["id", "social_id", "email", "full_name", "deleted_at"]),
                ("organizations", &["id", "name", "deleted_at"]),
                ("org_users", &["org_id", "user_id", "deleted_at"]),
                (
                    "meetings",
                    &["id", "org_id", "title", "conference", "meeting_date", "duration", "deleted_at"],
                ),
            ],
        )?;
        Ok(Self { conn })
    }

    /// Stamps `deleted_at` on one active row of `table`.
    fn soft_delete_row(&self, table: &'static str, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET
                    deleted_at = (strftime('%s', 'now') * 1000),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1
                   AND deleted_at IS NULL;"
            ),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(id));
        }
        Ok(())
    }

    /// Runs an update against one active row, failing when none matched.
    fn update_row(&self, sql: &str, params: &[&dyn ToSql], id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(sql, params)?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(id));
        }
        Ok(())
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        require_text("users.email", &user.email)?;
        self.conn
            .execute(
                "INSERT INTO users (id, social_id, email, full_name)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    user.id.to_string(),
                    user.social_id,
                    user.email,
                    user.full_name,
                ],
            )
            .map_err(|err| insert_error(err, user.id))?;
        Ok(user.id)
    }

    fn get_user_by_social_id(&self, social_id: &str) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, social_id, email, full_name
                 FROM users
                 WHERE social_id = ?1
                   AND deleted_at IS NULL;",
                [social_id],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, Option<String>>("social_id")?,
                        row.get::<_, String>("email")?,
                        row.get::<_, Option<String>>("full_name")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, social_id, email, full_name)| {
            Ok(User {
                id: parse_uuid(&id, "users.id")?,
                social_id,
                email,
                full_name,
            })
        })
        .transpose()
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        require_text("users.email", &user.email)?;
        self.update_row(
            "UPDATE users
             SET
                social_id = ?2,
                email = ?3,
                full_name = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![user.id.to_string(), user.social_id, user.email, user.full_name],
            user.id,
        )
    }

    fn soft_delete_user(&self, id: UserId) -> RepoResult<()> {
        self.soft_delete_row("users", id)
    }

    fn create_organization(&self, org: &Organization) -> RepoResult<OrgId> {
        require_text("organizations.name", &org.name)?;
        self.conn
            .execute(
                "INSERT INTO organizations (id, name) VALUES (?1, ?2);",
                params![org.id.to_string(), org.name],
            )
            .map_err(|err| insert_error(err, org.id))?;
        Ok(org.id)
    }

    fn update_organization(&self, org: &Organization) -> RepoResult<()> {
        require_text("organizations.name", &org.name)?;
        self.update_row(
            "UPDATE organizations
             SET
                name = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![org.id.to_string(), org.name],
            org.id,
        )
    }

    fn soft_delete_organization(&self, id: OrgId) -> RepoResult<()> {
        self.soft_delete_row("organizations", id)
    }

    fn organizations_for_user(&self, user_id: UserId) -> RepoResult<Vec<Organization>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, o.name
             FROM org_users ou
             INNER JOIN users u
                ON u.id = ou.user_id
                AND u.deleted_at IS NULL
             INNER JOIN organizations o
                ON o.id = ou.org_id
                AND o.deleted_at IS NULL
             WHERE ou.user_id = ?1
               AND ou.deleted_at IS NULL
             ORDER BY o.name ASC, o.id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut orgs = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            orgs.push(Organization {
                id: parse_uuid(&id_text, "organizations.id")?,
                name: row.get("name")?,
            });
        }
        Ok(orgs)
    }

    fn add_member(&self, org_id: OrgId, user_id: UserId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO org_users (org_id, user_id)
             VALUES (?1, ?2)
             ON CONFLICT (org_id, user_id) DO UPDATE SET deleted_at = NULL;",
            params![org_id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_member(&self, org_id: OrgId, user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE org_users
             SET deleted_at = (strftime('%s', 'now') * 1000)
             WHERE org_id = ?1
               AND user_id = ?2
               AND deleted_at IS NULL;",
            params![org_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(user_id));
        }
        Ok(())
    }

    fn create_meeting(&self, meeting: &Meeting) -> RepoResult<MeetingId> {
        require_text("meetings.title", &meeting.title)?;
        self.conn
            .execute(
                "INSERT INTO meetings (id, org_id, title, conference, meeting_date, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    meeting.id.to_string(),
                    meeting.org_id.to_string(),
                    meeting.title,
                    meeting.conference,
                    meeting.meeting_date,
                    meeting.duration,
                ],
            )
            .map_err(|err| insert_error(err, meeting.id))?;
        Ok(meeting.id)
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, org_id, title, conference, meeting_date, duration
             FROM meetings
             WHERE id = ?1
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_meeting_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_meeting(&self, meeting: &Meeting) -> RepoResult<()> {
        require_text("meetings.title", &meeting.title)?;
        self.update_row(
            "UPDATE meetings
             SET
                org_id = ?2,
                title = ?3,
                conference = ?4,
                meeting_date = ?5,
                duration = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![
                meeting.id.to_string(),
                meeting.org_id.to_string(),
                meeting.title,
                meeting.conference,
                meeting.meeting_date,
                meeting.duration,
            ],
            meeting.id,
        )
    }

    fn soft_delete_meeting(&self, id: MeetingId) -> RepoResult<()> {
        self.soft_delete_row("meetings", id)
    }

    fn meetings_for_user(&self, user_id: UserId) -> RepoResult<Vec<Meeting>> {
        let mut stmt = self.conn.prepare(&scoped(
            "SELECT id, org_id, title, conference, meeting_date, duration
             FROM meetings
             WHERE deleted_at IS NULL
               AND id IN (SELECT meeting_id FROM authorized_meetings)
             ORDER BY meeting_date ASC, id ASC;",
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut meetings = Vec::new();
        while let Some(row) = rows.next()? {
            meetings.push(parse_meeting_row(row)?);
        }
        Ok(meetings)
    }
}

fn parse_meeting_row(row: &Row<'_>) -> RepoResult<Meeting> {
    let id_text: String = row.get("id")?;
    let org_text: String = row.get("org_id")?;
    Ok(Meeting {
        id: parse_uuid(&id_text, "meetings.id")?,
        org_id: parse_uuid(&org_text, "meetings.org_id")?,
        title: row.get("title")?,
        conference: row.get("conference")?,
        meeting_date: row.get("meeting_date")?,
        duration: row.get("duration")?,
    })
}
