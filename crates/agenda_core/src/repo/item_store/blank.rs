//! `blank_items`: header columns only.

use super::VariantTable;
use crate::model::item::{ItemContent, ItemKind};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

pub(super) static TABLE: VariantTable = VariantTable {
    kind: ItemKind::Blank,
    table: "blank_items",
    columns: &[],
    bind,
    parse,
};

fn bind(content: &ItemContent) -> Option<Vec<Value>> {
    matches!(content, ItemContent::Blank).then(Vec::new)
}

fn parse(_row: &Row<'_>) -> RepoResult<ItemContent> {
    Ok(ItemContent::Blank)
}
