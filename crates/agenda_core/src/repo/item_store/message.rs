//! `message_items`: one required and one optional line of text.

use super::{optional_text, VariantTable};
use crate::model::item::{ItemContent, ItemKind, MessageContent};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

pub(super) static TABLE: VariantTable = VariantTable {
    kind: ItemKind::Message,
    table: "message_items",
    columns: &["primary_text", "secondary_text"],
    bind,
    parse,
};

fn bind(content: &ItemContent) -> Option<Vec<Value>> {
    let ItemContent::Message(message) = content else {
        return None;
    };
    Some(vec![
        Value::Text(message.primary_text.clone()),
        optional_text(message.secondary_text.as_deref()),
    ])
}

fn parse(row: &Row<'_>) -> RepoResult<ItemContent> {
    Ok(ItemContent::Message(MessageContent {
        primary_text: row.get("primary_text")?,
        secondary_text: row.get("secondary_text")?,
    }))
}
