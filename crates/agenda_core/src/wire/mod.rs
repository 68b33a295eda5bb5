//! JSON wire format for agenda items.
//!
//! # Responsibility
//! - Decode untyped request payloads into the concrete item variant.
//! - Encode items back into the same flat, discriminator-first shape.
//!
//! # Invariants
//! - The discriminator field is `type`; its values are exactly the
//!   `ItemKind` tags.
//! - An absent, `null`, empty, or nil `id` decodes to `None` so the caller can
//!   assign one.
//! - An unrecognised discriminator string is reported as
//!   `DecodeError::UnknownKind`, never folded into generic malformed-payload
//!   errors. A discriminator that is not a string is malformed.

use crate::model::item::{
    AgendaItem, ItemContent, ItemId, ItemKind, LyricsContent, MeetingId, MessageContent,
    SpeakerContent, TimerContent,
};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Name of the discriminator field on the wire.
pub const KIND_FIELD: &str = "type";

/// Decoding failures for one item payload.
#[derive(Debug)]
pub enum DecodeError {
    /// Payload is not a JSON object or a field has the wrong shape.
    Malformed(serde_json::Error),
    /// Payload has no `type` field.
    MissingKind,
    /// `type` is present but names no known variant.
    UnknownKind(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed item payload: {err}"),
            Self::MissingKind => write!(f, "item payload is missing `{KIND_FIELD}`"),
            Self::UnknownKind(value) => write!(f, "unknown item type `{value}`"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::MissingKind | Self::UnknownKind(_) => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Decoded request body: an item whose identifier may still be unassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPayload {
    pub id: Option<ItemId>,
    pub meeting_id: MeetingId,
    pub meeting_role: String,
    pub order: i64,
    pub content: ItemContent,
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    /// Converts into a full item, using `fallback` when no id was sent.
    pub fn into_item_or(self, fallback: impl FnOnce() -> ItemId) -> AgendaItem {
        let id = self.id.unwrap_or_else(fallback);
        AgendaItem {
            id,
            meeting_id: self.meeting_id,
            meeting_role: self.meeting_role,
            order: self.order,
            content: self.content,
        }
    }
}

#[derive(Deserialize)]
struct WireHeader {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<ItemId>,
    meeting_id: MeetingId,
    #[serde(default)]
    meeting_role: String,
    order: i64,
}

/// Decodes one item payload, reading the discriminator before anything else.
pub fn decode_item(bytes: &[u8]) -> Result<ItemPayload, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let kind = read_kind(&value)?;
    let header = WireHeader::deserialize(&value)?;

    let content = match kind {
        ItemKind::Blank => ItemContent::Blank,
        ItemKind::Message => ItemContent::Message(variant_fields::<MessageContent>(&value)?),
        ItemKind::Speaker => ItemContent::Speaker(variant_fields::<SpeakerContent>(&value)?),
        ItemKind::Lyrics => ItemContent::Lyrics(variant_fields::<LyricsContent>(&value)?),
        ItemKind::Timer => ItemContent::Timer(variant_fields::<TimerContent>(&value)?),
    };

    Ok(ItemPayload {
        id: header.id,
        meeting_id: header.meeting_id,
        meeting_role: header.meeting_role,
        order: header.order,
        content,
    })
}

/// Encodes one item as a flat JSON object.
pub fn encode_item(item: &AgendaItem) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(item)
}

/// Encodes an ordered item sequence as a JSON array.
pub fn encode_items(items: &[AgendaItem]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(items)
}

fn read_kind(value: &Value) -> Result<ItemKind, DecodeError> {
    let Value::Object(object) = value else {
        return Err(DecodeError::Malformed(serde::de::Error::custom(
            "item payload must be a JSON object",
        )));
    };

    match object.get(KIND_FIELD) {
        None | Some(Value::Null) => Err(DecodeError::MissingKind),
        Some(Value::String(tag)) => {
            ItemKind::parse(tag).ok_or_else(|| DecodeError::UnknownKind(tag.clone()))
        }
        Some(other) => Err(DecodeError::Malformed(serde::de::Error::custom(format!(
            "`{KIND_FIELD}` must be a string, got {other}"
        )))),
    }
}

fn variant_fields<T: DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    Ok(T::deserialize(value)?)
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<ItemId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(|id| (!id.is_nil()).then_some(id))
            .map_err(serde::de::Error::custom),
    }
}

impl Serialize for AgendaItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(KIND_FIELD, self.kind().as_str())?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("meeting_id", &self.meeting_id)?;
        map.serialize_entry("meeting_role", &self.meeting_role)?;
        map.serialize_entry("order", &self.order)?;

        match &self.content {
            ItemContent::Blank => {}
            ItemContent::Message(message) => {
                map.serialize_entry("primary_text", &message.primary_text)?;
                map.serialize_entry("secondary_text", &message.secondary_text)?;
            }
            ItemContent::Speaker(speaker) => {
                map.serialize_entry("speaker_name", &speaker.speaker_name)?;
                map.serialize_entry("title", &speaker.title)?;
                map.serialize_entry("expected_duration", &speaker.expected_duration)?;
            }
            ItemContent::Lyrics(lyrics) => {
                map.serialize_entry("hymn_id", &lyrics.hymn_id)?;
                map.serialize_entry("show_translation", &lyrics.show_translation)?;
            }
            ItemContent::Timer(timer) => {
                map.serialize_entry("show_meeting_details", &timer.show_meeting_details)?;
            }
        }

        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MEETING: &str = "22222222-2222-2222-2222-222222222222";

    fn decode_json(value: serde_json::Value) -> Result<ItemPayload, DecodeError> {
        decode_item(value.to_string().as_bytes())
    }

    #[test]
    fn decodes_blank_with_explicit_id() {
        let payload = decode_json(json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "meeting_id": MEETING,
            "type": "blank",
            "order": 1,
            "meeting_role": "my role"
        }))
        .unwrap();

        assert_eq!(
            payload.id,
            Some(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
        );
        assert_eq!(payload.kind(), ItemKind::Blank);
        assert_eq!(payload.order, 1);
        assert_eq!(payload.meeting_role, "my role");
    }

    #[test]
    fn absent_empty_and_nil_ids_decode_to_none() {
        for id in [
            json!(null),
            json!(""),
            json!("00000000-0000-0000-0000-000000000000"),
        ] {
            let payload = decode_json(json!({
                "id": id,
                "meeting_id": MEETING,
                "type": "timer",
                "order": 3
            }))
            .unwrap();
            assert_eq!(payload.id, None);
        }

        let payload = decode_json(json!({
            "meeting_id": MEETING,
            "type": "message",
            "order": 2,
            "primary_text": "Hello"
        }))
        .unwrap();
        assert_eq!(payload.id, None);
        assert_eq!(
            payload.content,
            ItemContent::Message(MessageContent {
                primary_text: "Hello".to_string(),
                secondary_text: None,
            })
        );
    }

    #[test]
    fn unknown_kind_is_distinguished_from_malformed() {
        let err = decode_json(json!({"type": "video", "meeting_id": MEETING, "order": 1}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(ref tag) if tag == "video"));

        let err = decode_json(json!({"meeting_id": MEETING, "order": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKind));

        let err = decode_item(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = decode_item(b"[1, 2]").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn non_string_discriminator_is_malformed() {
        for tag in [json!(3), json!(true), json!(["blank"]), json!({"kind": "blank"})] {
            let err = decode_json(json!({"type": tag, "meeting_id": MEETING, "order": 1}))
                .unwrap_err();
            assert!(matches!(err, DecodeError::Malformed(_)), "{err:?}");
        }
    }

    #[test]
    fn missing_required_variant_field_is_malformed() {
        let err = decode_json(json!({
            "type": "speaker",
            "meeting_id": MEETING,
            "order": 1
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn encoded_item_is_flat_and_discriminator_tagged() {
        let item = AgendaItem::new(
            Uuid::parse_str(MEETING).unwrap(),
            4,
            ItemContent::Lyrics(LyricsContent {
                hymn_id: "hymn-42".to_string(),
                show_translation: true,
            }),
        )
        .with_role("Chorister");

        let bytes = encode_item(&item).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "lyrics");
        assert_eq!(value["id"], item.id.to_string());
        assert_eq!(value["meeting_id"], MEETING);
        assert_eq!(value["meeting_role"], "Chorister");
        assert_eq!(value["order"], 4);
        assert_eq!(value["hymn_id"], "hymn-42");
        assert_eq!(value["show_translation"], true);
    }
}
