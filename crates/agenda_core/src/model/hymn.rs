//! Hymn catalog records.
//!
//! Lyrics items point at a hymn through `LyricsContent::hymn_id`; the
//! catalog holds the hymn header and its numbered verses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type HymnId = Uuid;

/// One hymn in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hymn {
    pub id: HymnId,
    /// Language tag, e.g. `en` or `es`.
    pub language: String,
    /// Page number in the printed hymnal.
    pub page: i64,
    pub name: String,
    /// Same hymn in another language, when one is catalogued.
    pub translation_id: Option<HymnId>,
    /// Active verses ordered by number. Empty on listings.
    #[serde(default)]
    pub verses: Vec<HymnVerse>,
}

impl Hymn {
    pub fn new(language: impl Into<String>, page: i64, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            language: language.into(),
            page,
            name: name.into(),
            translation_id: None,
            verses: Vec::new(),
        }
    }
}

/// One verse of a hymn, keyed by `(hymn_id, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HymnVerse {
    pub hymn_id: HymnId,
    /// 1-based verse number.
    pub number: i64,
    pub lines: Option<String>,
    /// Verse may be skipped when the hymn is sung.
    pub optional: bool,
}

impl HymnVerse {
    pub fn new(hymn_id: HymnId, number: i64, lines: impl Into<String>) -> Self {
        Self {
            hymn_id,
            number,
            lines: Some(lines.into()),
            optional: false,
        }
    }
}
