//! Per-variant agenda-item stores.
//!
//! # Responsibility
//! - Own create/read/update/soft-delete against one variant table each.
//! - Scope every read and every soft-delete by `scope::AUTHORIZED_MEETINGS_CTE`.
//! - Describe each variant's table in its own module (`blank`, `message`,
//!   `speaker`, `lyrics`, `timer`) keyed by `ItemKind`.
//!
//! # Invariants
//! - A store only accepts items whose `kind()` equals its own kind.
//! - Reads return `None`/empty for missing, soft-deleted and out-of-scope
//!   rows alike; the three cases are indistinguishable to callers.
//! - Per-store listing order is `item_order ASC, id ASC`.
//! - `update` performs no scope check; callers resolve ownership first.
//! - `create` checks only this table's key; `holds_id` lets callers check
//!   every table before inserting.

use crate::model::directory::UserId;
use crate::model::item::{AgendaItem, ItemContent, ItemId, ItemKind, MeetingId};
use crate::repo::scope::{scoped, IN_AUTHORIZED_MEETINGS};
use crate::repo::{
    arm_cancel, ensure_active, ensure_connection_ready, insert_error, parse_uuid, RepoError,
    RepoResult,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tokio_util::sync::CancellationToken;

mod blank;
mod lyrics;
mod message;
mod speaker;
mod timer;

const HEADER_COLUMNS: [&str; 5] = ["id", "meeting_id", "item_type", "item_order", "meeting_role"];

/// Static description of one variant's physical table.
pub struct VariantTable {
    pub kind: ItemKind,
    pub table: &'static str,
    /// Variant-specific columns, in bind order.
    pub columns: &'static [&'static str],
    /// Returns the values for `columns`, or `None` if `content` is another variant.
    pub bind: fn(&ItemContent) -> Option<Vec<Value>>,
    pub parse: fn(&Row<'_>) -> RepoResult<ItemContent>,
}

/// Returns the table descriptor owned by `kind`.
pub fn table_for(kind: ItemKind) -> &'static VariantTable {
    match kind {
        ItemKind::Blank => &blank::TABLE,
        ItemKind::Message => &message::TABLE,
        ItemKind::Speaker => &speaker::TABLE,
        ItemKind::Lyrics => &lyrics::TABLE,
        ItemKind::Timer => &timer::TABLE,
    }
}

/// A row as read back from a variant table.
///
/// `stored_type` is the raw `item_type` column, kept so callers can detect a
/// row whose tag disagrees with the table it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub stored_type: String,
    pub item: AgendaItem,
}

/// Store contract shared by every variant.
pub trait ItemStore {
    /// Variant owned by this store.
    fn kind(&self) -> ItemKind;
    fn create(&self, cancel: &CancellationToken, item: &AgendaItem) -> RepoResult<()>;
    /// Returns whether any row, soft-deleted or out of scope included, uses `id`.
    fn holds_id(&self, cancel: &CancellationToken, id: ItemId) -> RepoResult<bool>;
    fn soft_delete(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> RepoResult<usize>;
    fn get_by_id(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> RepoResult<Option<StoredItem>>;
    fn list_by_meeting(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        meeting_id: MeetingId,
    ) -> RepoResult<Vec<StoredItem>>;
    fn list_by_caller(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
    ) -> RepoResult<Vec<StoredItem>>;
    fn update(&self, cancel: &CancellationToken, id: ItemId, item: &AgendaItem)
        -> RepoResult<()>;
}

/// SQLite-backed store for one variant table.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
    table: &'static VariantTable,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Creates the store for `kind` from a migrated connection.
    pub fn try_new(conn: &'conn Connection, kind: ItemKind) -> RepoResult<Self> {
        let table = table_for(kind);
        let columns: Vec<&'static str> = HEADER_COLUMNS
            .iter()
            .chain(table.columns)
            .chain(&["deleted_at"])
            .copied()
            .collect();
        ensure_connection_ready(conn, &[(table.table, columns.as_slice())])?;
        Ok(Self { conn, table })
    }

    /// Creates one store per variant, in `ItemKind::ALL` order.
    pub fn try_all(conn: &'conn Connection) -> RepoResult<Vec<Self>> {
        ItemKind::ALL
            .into_iter()
            .map(|kind| Self::try_new(conn, kind))
            .collect()
    }

    fn select_sql(&self, filter: &str) -> String {
        let columns = HEADER_COLUMNS
            .iter()
            .chain(self.table.columns)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        scoped(&format!(
            "SELECT {columns}
             FROM {table}
             WHERE deleted_at IS NULL
               AND {IN_AUTHORIZED_MEETINGS}
               {filter}
             ORDER BY item_order ASC, id ASC;",
            table = self.table.table,
        ))
    }

    fn variant_values(&self, item: &AgendaItem) -> RepoResult<Vec<Value>> {
        item.validate()?;
        (self.table.bind)(&item.content).ok_or(RepoError::WrongStore {
            store: self.table.kind,
            item: item.kind(),
        })
    }

    fn collect_rows(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        bind: Vec<String>,
    ) -> RepoResult<Vec<StoredItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind))?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            ensure_active(cancel)?;
            items.push(self.parse_row(row)?);
        }
        Ok(items)
    }

    fn parse_row(&self, row: &Row<'_>) -> RepoResult<StoredItem> {
        let id_text: String = row.get("id")?;
        let meeting_text: String = row.get("meeting_id")?;
        let content = (self.table.parse)(row)?;

        Ok(StoredItem {
            stored_type: row.get("item_type")?,
            item: AgendaItem {
                id: parse_uuid(&id_text, "items.id")?,
                meeting_id: parse_uuid(&meeting_text, "items.meeting_id")?,
                meeting_role: row.get("meeting_role")?,
                order: row.get("item_order")?,
                content,
            },
        })
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn kind(&self) -> ItemKind {
        self.table.kind
    }

    fn create(&self, cancel: &CancellationToken, item: &AgendaItem) -> RepoResult<()> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let variant_values = self.variant_values(item)?;

        let columns = HEADER_COLUMNS
            .iter()
            .chain(self.table.columns)
            .copied()
            .collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders});",
            self.table.table,
            columns.join(", ")
        );

        let mut values = header_values(item, self.table.kind);
        values.extend(variant_values);

        debug!(
            "event=item_insert module=item_store status=start kind={} item_id={}",
            self.table.kind, item.id
        );
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|err| insert_error(err, item.id))?;
        Ok(())
    }

    fn holds_id(&self, cancel: &CancellationToken, id: ItemId) -> RepoResult<bool> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                self.table.table
            ),
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn soft_delete(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> RepoResult<usize> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let sql = scoped(&format!(
            "UPDATE {}
             SET
                deleted_at = (strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2
               AND deleted_at IS NULL
               AND {IN_AUTHORIZED_MEETINGS};",
            self.table.table
        ));
        let changed = self
            .conn
            .execute(&sql, params![caller.to_string(), id.to_string()])?;
        Ok(changed)
    }

    fn get_by_id(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        id: ItemId,
    ) -> RepoResult<Option<StoredItem>> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let sql = self.select_sql("AND id = ?2");
        let mut rows = self.collect_rows(cancel, &sql, vec![caller.to_string(), id.to_string()])?;
        Ok(rows.pop())
    }

    fn list_by_meeting(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
        meeting_id: MeetingId,
    ) -> RepoResult<Vec<StoredItem>> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let sql = self.select_sql("AND meeting_id = ?2");
        self.collect_rows(
            cancel,
            &sql,
            vec![caller.to_string(), meeting_id.to_string()],
        )
    }

    fn list_by_caller(
        &self,
        cancel: &CancellationToken,
        caller: UserId,
    ) -> RepoResult<Vec<StoredItem>> {
        let _armed = arm_cancel(self.conn, cancel)?;
        let sql = self.select_sql("");
        self.collect_rows(cancel, &sql, vec![caller.to_string()])
    }

    fn update(&self, cancel: &CancellationToken, id: ItemId, item: &AgendaItem) -> RepoResult<()> {
        let _armed = arm_cancel(self.conn, cancel)?;
        if item.id != id {
            return Err(RepoError::InvalidData(format!(
                "update target {id} does not match record id {}",
                item.id
            )));
        }
        let variant_values = self.variant_values(item)?;

        // ?1 is the target id; header columns other than `id` follow from ?2.
        let assignments = HEADER_COLUMNS
            .iter()
            .skip(1)
            .chain(self.table.columns)
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 2))
            .collect::<Vec<_>>()
            .join(",\n                ");
        let sql = format!(
            "UPDATE {}
             SET
                {assignments},
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            self.table.table
        );

        let mut values = header_values(item, self.table.kind);
        values.extend(variant_values);

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NoRowsAffected(id));
        }
        Ok(())
    }
}

/// Values for `HEADER_COLUMNS`, with `item_type` taken from the store.
fn header_values(item: &AgendaItem, kind: ItemKind) -> Vec<Value> {
    vec![
        Value::Text(item.id.to_string()),
        Value::Text(item.meeting_id.to_string()),
        Value::Text(kind.as_str().to_string()),
        Value::Integer(item.order),
        Value::Text(item.meeting_role.clone()),
    ]
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}
