#![allow(dead_code)]

use agenda_core::{
    open_db_in_memory, CallerContext, DirectoryRepository, Meeting, MeetingId, OrgId,
    Organization, SqliteDirectoryRepository, User, UserId,
};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

/// One user who is an active member of one organization with one meeting.
pub struct Member {
    pub social_id: String,
    pub user_id: UserId,
    pub org_id: OrgId,
    pub meeting_id: MeetingId,
}

impl Member {
    pub fn caller(&self) -> CallerContext {
        CallerContext::new(self.social_id.clone())
    }
}

pub fn open() -> Connection {
    open_db_in_memory().unwrap()
}

/// Creates a user, an organization, the membership and one meeting.
pub fn seed_member(conn: &Connection, social_id: &str) -> Member {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();

    let user = User::new(social_id, format!("{social_id}@example.org"));
    let org = Organization::new(format!("{social_id} ward"));
    directory.create_user(&user).unwrap();
    directory.create_organization(&org).unwrap();
    directory.add_member(org.id, user.id).unwrap();
    let meeting_id = add_meeting(conn, org.id, "Sacrament meeting");

    Member {
        social_id: social_id.to_string(),
        user_id: user.id,
        org_id: org.id,
        meeting_id,
    }
}

/// Creates a user with `social_id` and makes it a member of `org_id`.
pub fn seed_user_in(conn: &Connection, social_id: &str, org_id: OrgId) -> UserId {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();
    let user = User::new(social_id, format!("{social_id}@example.org"));
    directory.create_user(&user).unwrap();
    directory.add_member(org_id, user.id).unwrap();
    user.id
}

pub fn add_meeting(conn: &Connection, org_id: OrgId, title: &str) -> MeetingId {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();
    let meeting = Meeting::new(org_id, title, 1_700_000_000_000);
    directory.create_meeting(&meeting).unwrap()
}

pub fn payload(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

/// Returns `(present, soft_deleted)` for the physical row with `id` in `table`.
pub fn physical_row(conn: &Connection, table: &str, id: Uuid) -> (bool, bool) {
    let deleted_at: Option<Option<i64>> = conn
        .query_row(
            &format!("SELECT deleted_at FROM {table} WHERE id = ?1;"),
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .unwrap();

    match deleted_at {
        Some(stamp) => (true, stamp.is_some()),
        None => (false, false),
    }
}

/// Snapshot of every column of one item row, for "row untouched" checks.
pub fn row_snapshot(conn: &Connection, table: &str, id: Uuid) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {table} WHERE id = ?1;"))
        .unwrap();
    let column_count = stmt.column_count();
    stmt.query_row([id.to_string()], |row| {
        (0..column_count)
            .map(|index| {
                row.get::<_, rusqlite::types::Value>(index)
                    .map(|value| format!("{value:?}"))
            })
            .collect::<rusqlite::Result<Vec<_>>>()
    })
    .unwrap()
}
