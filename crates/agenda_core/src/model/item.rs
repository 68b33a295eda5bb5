//! Agenda item domain model.
//!
//! # Responsibility
//! - Define the closed set of agenda-item variants (`ItemKind`).
//! - Carry the common header every variant shares plus one payload per variant.
//! - Validate required variant fields before anything is persisted.
//!
//! # Invariants
//! - `ItemKind::ALL` is the registry order used for every cross-variant fan-out.
//! - An item's `id` and `kind()` never change after creation.
//! - `order` is caller-supplied; uniqueness and contiguity are not enforced.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one agenda item.
pub type ItemId = Uuid;

/// Identifier of the meeting that owns an agenda item.
pub type MeetingId = Uuid;

/// Variant tag of an agenda item.
///
/// The string forms (`blank|message|speaker|lyrics|timer`) are shared by the
/// wire discriminator and the persisted `item_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    /// Marker slide with no content of its own.
    Blank,
    /// One or two lines of free text.
    Message,
    /// Speaker introduction.
    Speaker,
    /// Hymn lyrics looked up from the hymn catalog.
    Lyrics,
    /// Countdown/clock slide.
    Timer,
}

impl ItemKind {
    /// Every variant, in the order stores are consulted during fan-out.
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Blank,
        ItemKind::Message,
        ItemKind::Speaker,
        ItemKind::Lyrics,
        ItemKind::Timer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Message => "message",
            Self::Speaker => "speaker",
            Self::Lyrics => "lyrics",
            Self::Timer => "timer",
        }
    }

    /// Parses the exact lowercase tag. Anything else is not a known variant.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `message` item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageContent {
    pub primary_text: String,
    pub secondary_text: Option<String>,
}

/// Payload of a `speaker` item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeakerContent {
    pub speaker_name: String,
    pub title: Option<String>,
    /// Expected talk length in seconds.
    pub expected_duration: Option<i64>,
}

/// Payload of a `lyrics` item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LyricsContent {
    /// Key into the hymn catalog; not resolved by this crate.
    pub hymn_id: String,
    #[serde(default)]
    pub show_translation: bool,
}

/// Payload of a `timer` item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TimerContent {
    #[serde(default)]
    pub show_meeting_details: bool,
}

/// Variant-specific part of an agenda item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    Blank,
    Message(MessageContent),
    Speaker(SpeakerContent),
    Lyrics(LyricsContent),
    Timer(TimerContent),
}

impl ItemContent {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Blank => ItemKind::Blank,
            Self::Message(_) => ItemKind::Message,
            Self::Speaker(_) => ItemKind::Speaker,
            Self::Lyrics(_) => ItemKind::Lyrics,
            Self::Timer(_) => ItemKind::Timer,
        }
    }
}

/// Validation failures for agenda items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    NilId,
    NilMeetingId,
    /// A required text field is empty after trimming.
    MissingField(&'static str),
    NegativeDuration(i64),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "item id must not be nil"),
            Self::NilMeetingId => write!(f, "meeting_id must not be nil"),
            Self::MissingField(field) => write!(f, "required field `{field}` is empty"),
            Self::NegativeDuration(value) => {
                write!(f, "expected_duration must not be negative, got {value}")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// One agenda item of any variant.
///
/// The common header lives on the struct; variant data lives in `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaItem {
    pub id: ItemId,
    pub meeting_id: MeetingId,
    /// Free-text label of the person/role presenting this item.
    pub meeting_role: String,
    /// Rank inside the meeting; lower sorts first.
    pub order: i64,
    pub content: ItemContent,
}

impl AgendaItem {
    /// Creates an item with a generated stable ID.
    pub fn new(meeting_id: MeetingId, order: i64, content: ItemContent) -> Self {
        Self::with_id(Uuid::new_v4(), meeting_id, order, content)
    }

    /// Creates an item with a caller-provided stable ID.
    pub fn with_id(id: ItemId, meeting_id: MeetingId, order: i64, content: ItemContent) -> Self {
        Self {
            id,
            meeting_id,
            meeting_role: String::new(),
            order,
            content,
        }
    }

    /// Builder-style setter for `meeting_role`.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.meeting_role = role.into();
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    /// Checks identifiers and the required fields of the active variant.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.is_nil() {
            return Err(ItemValidationError::NilId);
        }
        if self.meeting_id.is_nil() {
            return Err(ItemValidationError::NilMeetingId);
        }

        match &self.content {
            ItemContent::Blank | ItemContent::Timer(_) => Ok(()),
            ItemContent::Message(message) => require("primary_text", &message.primary_text),
            ItemContent::Speaker(speaker) => {
                require("speaker_name", &speaker.speaker_name)?;
                match speaker.expected_duration {
                    Some(seconds) if seconds < 0 => {
                        Err(ItemValidationError::NegativeDuration(seconds))
                    }
                    _ => Ok(()),
                }
            }
            ItemContent::Lyrics(lyrics) => require("hymn_id", &lyrics.hymn_id),
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ItemValidationError> {
    if value.trim().is_empty() {
        Err(ItemValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip_through_parse() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("Blank"), None);
        assert_eq!(ItemKind::parse("slide"), None);
    }

    #[test]
    fn validate_rejects_blank_required_text() {
        let item = AgendaItem::new(
            Uuid::new_v4(),
            1,
            ItemContent::Message(MessageContent {
                primary_text: "   ".to_string(),
                secondary_text: None,
            }),
        );
        assert_eq!(
            item.validate(),
            Err(ItemValidationError::MissingField("primary_text"))
        );
    }

    #[test]
    fn validate_rejects_negative_speaker_duration() {
        let item = AgendaItem::new(
            Uuid::new_v4(),
            1,
            ItemContent::Speaker(SpeakerContent {
                speaker_name: "Ada".to_string(),
                title: None,
                expected_duration: Some(-5),
            }),
        );
        assert_eq!(
            item.validate(),
            Err(ItemValidationError::NegativeDuration(-5))
        );
    }

    #[test]
    fn validate_rejects_nil_ids() {
        let item = AgendaItem::with_id(Uuid::nil(), Uuid::new_v4(), 0, ItemContent::Blank);
        assert_eq!(item.validate(), Err(ItemValidationError::NilId));

        let item = AgendaItem::new(Uuid::nil(), 0, ItemContent::Blank);
        assert_eq!(item.validate(), Err(ItemValidationError::NilMeetingId));
    }
}
