use super::VariantTable;
use crate::model::item::{ItemContent, ItemKind, TimerContent};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

pub(super) static TABLE: VariantTable = VariantTable {
    kind: ItemKind::Timer,
    table: "timer_items",
    columns: &["show_meeting_details"],
    bind,
    parse,
};

fn bind(content: &ItemContent) -> Option<Vec<Value>> {
    let ItemContent::Timer(timer) = content else {
        return None;
    };
    Some(vec![Value::Integer(i64::from(timer.show_meeting_details))])
}

fn parse(row: &Row<'_>) -> RepoResult<ItemContent> {
    Ok(ItemContent::Timer(TimerContent {
        show_meeting_details: row.get("show_meeting_details")?,
    }))
}
