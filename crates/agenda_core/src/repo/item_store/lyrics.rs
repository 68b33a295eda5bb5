use super::VariantTable;
use crate::model::item::{ItemContent, ItemKind, LyricsContent};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;

pub(super) static TABLE: VariantTable = VariantTable {
    kind: ItemKind::Lyrics,
    table: "lyrics_items",
    columns: &["hymn_id", "show_translation"],
    bind,
    parse,
};

fn bind(content: &ItemContent) -> Option<Vec<Value>> {
    let ItemContent::Lyrics(lyrics) = content else {
        return None;
    };
    Some(vec![
        Value::Text(lyrics.hymn_id.clone()),
        Value::Integer(i64::from(lyrics.show_translation)),
    ])
}

fn parse(row: &Row<'_>) -> RepoResult<ItemContent> {
    Ok(ItemContent::Lyrics(LyricsContent {
        hymn_id: row.get("hymn_id")?,
        show_translation: row.get("show_translation")?,
    }))
}
