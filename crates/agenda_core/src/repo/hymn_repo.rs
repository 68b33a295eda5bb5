//! Hymn catalog repository: hymns and their numbered verses.
//!
//! # Responsibility
//! - Persist the catalog that lyrics items refer to by `hymn_id`.
//! - Soft-delete hymns and verses; nothing is hard-deleted.
//!
//! # Invariants
//! - The catalog is shared by every organization and is not caller-scoped.
//! - Soft-deleted hymns and verses are never returned by reads.
//! - A verse is keyed by `(hymn_id, number)`; numbers start at 1.
//! - Verses are always returned ordered by number.

use crate::model::hymn::{Hymn, HymnId, HymnVerse};
use crate::repo::{
    ensure_connection_ready, insert_error, parse_uuid, require_text, RepoError, RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, Row};

/// Repository interface for the hymn catalog.
pub trait HymnRepository {
    fn create_hymn(&self, hymn: &Hymn) -> RepoResult<HymnId>;
    /// Gets one active hymn with its active verses.
    fn get_hymn(&self, id: HymnId) -> RepoResult<Option<Hymn>>;
    /// Lists active hymns of one language by page; verses are not loaded.
    fn list_hymns(&self, language: &str) -> RepoResult<Vec<Hymn>>;
    /// Replaces the header columns of one active hymn.
    fn update_hymn(&self, hymn: &Hymn) -> RepoResult<()>;
    fn soft_delete_hymn(&self, id: HymnId) -> RepoResult<()>;

    fn create_verse(&self, verse: &HymnVerse) -> RepoResult<()>;
    fn get_verse(&self, hymn_id: HymnId, number: i64) -> RepoResult<Option<HymnVerse>>;
    fn list_verses(&self, hymn_id: HymnId) -> RepoResult<Vec<HymnVerse>>;
    /// Replaces the lines and optional flag of one active verse.
    fn update_verse(&self, verse: &HymnVerse) -> RepoResult<()>;
    fn soft_delete_verse(&self, hymn_id: HymnId, number: i64) -> RepoResult<()>;
}

/// SQLite-backed hymn catalog.
pub struct SqliteHymnRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHymnRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "hymns",
                    &["id", "language", "page", "name", "translation_id", "deleted_at"],
                ),
                (
                    "hymn_verses",
                    &["hymn_id", "verse_number", "verse_lines", "optional", "deleted_at"],
                ),
            ],
        )?;
        Ok(Self { conn })
    }

    fn hymn_is_active(&self, id: HymnId) -> RepoResult<bool> {
        let active: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM hymns WHERE id = ?1 AND deleted_at IS NULL
            );",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(active == 1)
    }
}

impl HymnRepository for SqliteHymnRepository<'_> {
    fn create_hymn(&self, hymn: &Hymn) -> RepoResult<HymnId> {
        validate_hymn(hymn)?;
        self.conn
            .execute(
                "INSERT INTO hymns (id, language, page, name, translation_id)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    hymn.id.to_string(),
                    hymn.language,
                    hymn.page,
                    hymn.name,
                    hymn.translation_id.map(|id| id.to_string()),
                ],
            )
            .map_err(|err| insert_error(err, hymn.id))?;
        debug!(
            "event=hymn_create module=hymn_repo status=ok hymn_id={} language={}",
            hymn.id, hymn.language
        );
        Ok(hymn.id)
    }

    fn get_hymn(&self, id: HymnId) -> RepoResult<Option<Hymn>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, language, page, name, translation_id
             FROM hymns
             WHERE id = ?1
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut hymn = parse_hymn_row(row)?;
        hymn.verses = self.list_verses(id)?;
        Ok(Some(hymn))
    }

    fn list_hymns(&self, language: &str) -> RepoResult<Vec<Hymn>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, language, page, name, translation_id
             FROM hymns
             WHERE language = ?1
               AND deleted_at IS NULL
             ORDER BY page ASC, id ASC;",
        )?;
        let mut rows = stmt.query([language])?;
        let mut hymns = Vec::new();
        while let Some(row) = rows.next()? {
            hymns.push(parse_hymn_row(row)?);
        }
        Ok(hymns)
    }

    fn update_hymn(&self, hymn: &Hymn) -> RepoResult<()> {
        validate_hymn(hymn)?;
        let changed = self.conn.execute(
            "UPDATE hymns
             SET
                language = ?2,
                page = ?3,
                name = ?4,
                translation_id = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![
                hymn.id.to_string(),
                hymn.language,
                hymn.page,
                hymn.name,
                hymn.translation_id.map(|id| id.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(hymn.id));
        }
        Ok(())
    }

    fn soft_delete_hymn(&self, id: HymnId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE hymns
             SET
                deleted_at = (strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(id));
        }
        debug!("event=hymn_delete module=hymn_repo status=ok hymn_id={id}");
        Ok(())
    }

    fn create_verse(&self, verse: &HymnVerse) -> RepoResult<()> {
        validate_verse_number(verse.number)?;
        if !self.hymn_is_active(verse.hymn_id)? {
            return Err(RepoError::NoRowsAffected(verse.hymn_id));
        }
        self.conn
            .execute(
                "INSERT INTO hymn_verses (hymn_id, verse_number, verse_lines, optional)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    verse.hymn_id.to_string(),
                    verse.number,
                    verse.lines,
                    verse.optional,
                ],
            )
            .map_err(|err| insert_error(err, verse.hymn_id))?;
        Ok(())
    }

    fn get_verse(&self, hymn_id: HymnId, number: i64) -> RepoResult<Option<HymnVerse>> {
        let mut stmt = self.conn.prepare(
            "SELECT hymn_id, verse_number, verse_lines, optional
             FROM hymn_verses
             WHERE hymn_id = ?1
               AND verse_number = ?2
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query(params![hymn_id.to_string(), number])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_verse_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_verses(&self, hymn_id: HymnId) -> RepoResult<Vec<HymnVerse>> {
        let mut stmt = self.conn.prepare(
            "SELECT hymn_id, verse_number, verse_lines, optional
             FROM hymn_verses
             WHERE hymn_id = ?1
               AND deleted_at IS NULL
             ORDER BY verse_number ASC;",
        )?;
        let mut rows = stmt.query([hymn_id.to_string()])?;
        let mut verses = Vec::new();
        while let Some(row) = rows.next()? {
            verses.push(parse_verse_row(row)?);
        }
        Ok(verses)
    }

    fn update_verse(&self, verse: &HymnVerse) -> RepoResult<()> {
        validate_verse_number(verse.number)?;
        let changed = self.conn.execute(
            "UPDATE hymn_verses
             SET
                verse_lines = ?3,
                optional = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE hymn_id = ?1
               AND verse_number = ?2
               AND deleted_at IS NULL;",
            params![
                verse.hymn_id.to_string(),
                verse.number,
                verse.lines,
                verse.optional,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(verse.hymn_id));
        }
        Ok(())
    }

    fn soft_delete_verse(&self, hymn_id: HymnId, number: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE hymn_verses
             SET
                deleted_at = (strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE hymn_id = ?1
               AND verse_number = ?2
               AND deleted_at IS NULL;",
            params![hymn_id.to_string(), number],
        )?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(hymn_id));
        }
        Ok(())
    }
}

fn validate_hymn(hymn: &Hymn) -> RepoResult<()> {
    require_text("hymns.language", &hymn.language)?;
    require_text("hymns.name", &hymn.name)?;
    if hymn.page < 0 {
        return Err(RepoError::InvalidData(format!(
            "hymns.page must not be negative, got {}",
            hymn.page
        )));
    }
    if hymn.translation_id == Some(hymn.id) {
        return Err(RepoError::InvalidData(
            "hymns.translation_id must not point at the hymn itself".to_string(),
        ));
    }
    Ok(())
}

fn validate_verse_number(number: i64) -> RepoResult<()> {
    if number < 1 {
        return Err(RepoError::InvalidData(format!(
            "hymn_verses.verse_number must be at least 1, got {number}"
        )));
    }
    Ok(())
}

fn parse_hymn_row(row: &Row<'_>) -> RepoResult<Hymn> {
    let id_text: String = row.get("id")?;
    let translation_text: Option<String> = row.get("translation_id")?;
    Ok(Hymn {
        id: parse_uuid(&id_text, "hymns.id")?,
        language: row.get("language")?,
        page: row.get("page")?,
        name: row.get("name")?,
        translation_id: translation_text
            .map(|text| parse_uuid(&text, "hymns.translation_id"))
            .transpose()?,
        verses: Vec::new(),
    })
}

fn parse_verse_row(row: &Row<'_>) -> RepoResult<HymnVerse> {
    let hymn_text: String = row.get("hymn_id")?;
    Ok(HymnVerse {
        hymn_id: parse_uuid(&hymn_text, "hymn_verses.hymn_id")?,
        number: row.get("verse_number")?,
        lines: row.get("verse_lines")?,
        optional: row.get("optional")?,
    })
}
