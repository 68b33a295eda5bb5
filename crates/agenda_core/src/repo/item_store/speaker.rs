//! `speaker_items`: speaker introduction with optional title and duration.

use super::{optional_text, VariantTable};
use crate::model::item::{ItemContent, ItemKind, SpeakerContent};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

pub(super) static TABLE: VariantTable = VariantTable {
    kind: ItemKind::Speaker,
    table: "speaker_items",
    columns: &["speaker_name", "title", "expected_duration"],
    bind,
    parse,
};

fn bind(content: &ItemContent) -> Option<Vec<Value>> {
    let ItemContent::Speaker(speaker) = content else {
        return None;
    };
    Some(vec![
        Value::Text(speaker.speaker_name.clone()),
        optional_text(speaker.title.as_deref()),
        speaker.expected_duration.map_or(Value::Null, Value::Integer),
    ])
}

fn parse(row: &Row<'_>) -> RepoResult<ItemContent> {
    Ok(ItemContent::Speaker(SpeakerContent {
        speaker_name: row.get("speaker_name")?,
        title: row.get("title")?,
        expected_duration: row.get("expected_duration")?,
    }))
}
