mod common;

use agenda_core::{
    decode_item, encode_item, AgendaItem, CallerContext, CancellationToken, DecodeError,
    ErrorClass, ItemContent, ItemKind, ItemService, LyricsContent, MessageContent, ServiceError,
    SpeakerContent, TimerContent,
};
use common::{add_meeting, open, payload, physical_row, seed_member};
use serde_json::json;
use uuid::Uuid;

#[test]
fn message_lifecycle_create_get_update_list() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let created = service
        .create(
            &caller,
            &payload(json!({
                "type": "message",
                "meeting_id": member.meeting_id,
                "meeting_role": "Reader",
                "order": 1,
                "primary_text": "Welcome"
            })),
        )
        .unwrap();
    assert!(!created.id.is_nil());

    let fetched = service.get(&caller, created.id).unwrap();
    assert_eq!(fetched, created);

    let updated = service
        .update(
            &caller,
            created.id,
            &payload(json!({
                "type": "message",
                "meeting_id": member.meeting_id,
                "meeting_role": "Reader",
                "order": 2,
                "primary_text": "Good evening"
            })),
        )
        .unwrap();
    assert_eq!(updated.id, created.id);

    let listed = service.list_by_meeting(&caller, member.meeting_id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].order, 2);
    assert_eq!(
        listed[0].content,
        ItemContent::Message(MessageContent {
            primary_text: "Good evening".to_string(),
            secondary_text: None,
        })
    );
}

#[test]
fn items_of_different_variants_merge_by_rank() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let blank = service
        .create(
            &caller,
            &payload(json!({"type": "blank", "meeting_id": member.meeting_id, "order": 2})),
        )
        .unwrap();
    let speaker = service
        .create(
            &caller,
            &payload(json!({
                "type": "speaker",
                "meeting_id": member.meeting_id,
                "order": 1,
                "speaker_name": "Elder Ruiz"
            })),
        )
        .unwrap();

    let listed = service.list_by_meeting(&caller, member.meeting_id).unwrap();
    let ids = listed.iter().map(|item| item.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![speaker.id, blank.id]);
    assert_eq!(listed[0].kind(), ItemKind::Speaker);
}

#[test]
fn equal_ranks_keep_registry_order_across_runs() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    for body in [
        json!({"type": "timer", "meeting_id": member.meeting_id, "order": 1}),
        json!({"type": "lyrics", "meeting_id": member.meeting_id, "order": 1, "hymn_id": "h-1"}),
        json!({"type": "blank", "meeting_id": member.meeting_id, "order": 1}),
    ] {
        service.create(&caller, &payload(body)).unwrap();
    }

    let first = service.list(&caller).unwrap();
    let kinds = first.iter().map(AgendaItem::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![ItemKind::Blank, ItemKind::Lyrics, ItemKind::Timer]);
    assert_eq!(service.list(&caller).unwrap(), first);
}

#[test]
fn list_spans_every_meeting_in_scope() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let second_meeting = add_meeting(&conn, member.org_id, "Youth meeting");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    for (meeting_id, order) in [(member.meeting_id, 3), (second_meeting, 1)] {
        service
            .create(
                &caller,
                &payload(json!({"type": "blank", "meeting_id": meeting_id, "order": order})),
            )
            .unwrap();
    }

    let all = service.list(&caller).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].meeting_id, second_meeting);
    assert_eq!(
        service.list_by_meeting(&caller, second_meeting).unwrap().len(),
        1
    );
}

#[test]
fn second_create_with_same_id_is_conflict() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();
    let id = Uuid::new_v4();

    let body = |text: &str| {
        payload(json!({
            "id": id,
            "type": "message",
            "meeting_id": member.meeting_id,
            "order": 1,
            "primary_text": text
        }))
    };
    service.create(&caller, &body("original")).unwrap();

    let err = service.create(&caller, &body("replacement")).unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(existing) if existing == id));
    assert_eq!(err.class(), ErrorClass::Conflict);

    let stored = service.get(&caller, id).unwrap();
    assert_eq!(
        stored.content,
        ItemContent::Message(MessageContent {
            primary_text: "original".to_string(),
            secondary_text: None,
        })
    );
}

#[test]
fn id_used_by_another_variant_is_conflict_and_keeps_the_first_item() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();
    let id = Uuid::new_v4();

    let first = service
        .create(
            &caller,
            &payload(json!({
                "id": id,
                "type": "message",
                "meeting_id": member.meeting_id,
                "order": 1,
                "primary_text": "Welcome"
            })),
        )
        .unwrap();

    let err = service
        .create(
            &caller,
            &payload(json!({"id": id, "type": "blank", "meeting_id": member.meeting_id, "order": 2})),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(existing) if existing == id));
    assert_eq!(err.class(), ErrorClass::Conflict);

    assert_eq!(physical_row(&conn, "blank_items", id), (false, false));
    assert_eq!(service.get(&caller, id).unwrap(), first);
}

#[test]
fn soft_deleted_id_cannot_be_reused_by_any_variant() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let item = service
        .create(
            &caller,
            &payload(json!({"type": "timer", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap();
    service.delete(&caller, item.id).unwrap();

    for kind in ["timer", "blank"] {
        let err = service
            .create(
                &caller,
                &payload(json!({"id": item.id, "type": kind, "meeting_id": member.meeting_id, "order": 1})),
            )
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Conflict);
    }
}

#[test]
fn same_id_in_two_variant_tables_is_an_integrity_fault_on_read() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let item = service
        .create(
            &caller,
            &payload(json!({"type": "blank", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap();
    conn.execute(
        "INSERT INTO timer_items (id, meeting_id, item_type, item_order)
         VALUES (?1, ?2, 'timer', 2);",
        [item.id.to_string(), member.meeting_id.to_string()],
    )
    .unwrap();

    let err = service.get(&caller, item.id).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert_eq!(err.code(), "integrity");
}

#[test]
fn soft_deleted_item_is_not_found_but_still_stored() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let item = service
        .create(
            &caller,
            &payload(json!({"type": "timer", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap();

    let report = service.delete(&caller, item.id).unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.per_kind.len(), ItemKind::ALL.len());
    assert!(report.per_kind.contains(&(ItemKind::Timer, 1)));

    let err = service.get(&caller, item.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(id) if id == item.id));
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(physical_row(&conn, "timer_items", item.id), (true, true));
    assert!(service.list(&caller).unwrap().is_empty());
}

#[test]
fn deleting_unknown_or_already_deleted_id_succeeds_with_zero() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let report = service.delete(&caller, Uuid::new_v4()).unwrap();
    assert_eq!(report.total, 0);

    let item = service
        .create(
            &caller,
            &payload(json!({"type": "blank", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap();
    assert_eq!(service.delete(&caller, item.id).unwrap().total, 1);
    assert_eq!(service.delete(&caller, item.id).unwrap().total, 0);
}

#[test]
fn unknown_caller_is_rejected_before_any_store() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let stranger = CallerContext::new("nobody");

    let err = service
        .create(
            &stranger,
            &payload(json!({"type": "blank", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownCaller));
    assert!(matches!(
        service.list(&stranger).unwrap_err(),
        ServiceError::UnknownCaller
    ));
}

#[test]
fn unknown_discriminator_is_a_distinct_client_fault() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();

    let err = service
        .create(
            &member.caller(),
            &payload(json!({"type": "video", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Decode(DecodeError::UnknownKind(ref tag)) if tag == "video"
    ));
    assert_eq!(err.class(), ErrorClass::ClientFault);
    assert_eq!(err.code(), "unknown_kind");

    let err = service.create(&member.caller(), b"{\"type\":").unwrap_err();
    assert_eq!(err.class(), ErrorClass::ClientFault);
    assert_eq!(err.code(), "decode_failed");
}

#[test]
fn create_in_meeting_outside_scope_is_meeting_not_found() {
    let conn = open();
    let alice = seed_member(&conn, "alice");
    let bob = seed_member(&conn, "bob");
    let service = ItemService::try_new(&conn).unwrap();

    let err = service
        .create(
            &alice.caller(),
            &payload(json!({"type": "blank", "meeting_id": bob.meeting_id, "order": 1})),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::MeetingNotFound(id) if id == bob.meeting_id));
    assert!(service.list(&bob.caller()).unwrap().is_empty());
}

#[test]
fn update_fills_missing_id_and_rejects_mismatch_and_kind_change() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let caller = member.caller();

    let item = service
        .create(
            &caller,
            &payload(json!({
                "type": "lyrics",
                "meeting_id": member.meeting_id,
                "order": 1,
                "hymn_id": "hymn-19"
            })),
        )
        .unwrap();

    let updated = service
        .update(
            &caller,
            item.id,
            &payload(json!({
                "id": "",
                "type": "lyrics",
                "meeting_id": member.meeting_id,
                "order": 1,
                "hymn_id": "hymn-19",
                "show_translation": true
            })),
        )
        .unwrap();
    assert_eq!(updated.id, item.id);
    assert_eq!(
        service.get(&caller, item.id).unwrap().content,
        ItemContent::Lyrics(LyricsContent {
            hymn_id: "hymn-19".to_string(),
            show_translation: true,
        })
    );

    let other_id = Uuid::new_v4();
    let err = service
        .update(
            &caller,
            item.id,
            &payload(json!({
                "id": other_id,
                "type": "lyrics",
                "meeting_id": member.meeting_id,
                "order": 1,
                "hymn_id": "hymn-19"
            })),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::IdMismatch { path, payload } if path == item.id && payload == other_id
    ));

    let err = service
        .update(
            &caller,
            item.id,
            &payload(json!({"type": "timer", "meeting_id": member.meeting_id, "order": 1})),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::KindChange {
            stored: ItemKind::Lyrics,
            requested: ItemKind::Timer,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::ClientFault);
}

#[test]
fn update_of_invisible_item_is_not_found() {
    let conn = open();
    let alice = seed_member(&conn, "alice");
    let bob = seed_member(&conn, "bob");
    let service = ItemService::try_new(&conn).unwrap();

    let item = service
        .create(
            &alice.caller(),
            &payload(json!({"type": "blank", "meeting_id": alice.meeting_id, "order": 1})),
        )
        .unwrap();

    let err = service
        .update(
            &bob.caller(),
            item.id,
            &payload(json!({"type": "blank", "meeting_id": bob.meeting_id, "order": 7})),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(id) if id == item.id));
    assert_eq!(service.get(&alice.caller(), item.id).unwrap().order, 1);

    let err = service
        .update(
            &alice.caller(),
            Uuid::new_v4(),
            &payload(json!({"type": "blank", "meeting_id": alice.meeting_id, "order": 1})),
        )
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn cancelled_request_is_reported_as_cancelled() {
    let conn = open();
    let member = seed_member(&conn, "alice");
    let service = ItemService::try_new(&conn).unwrap();
    let cancel = CancellationToken::new();
    let caller = CallerContext::with_cancel(member.social_id.clone(), cancel.clone());
    cancel.cancel();

    let err = service.list(&caller).unwrap_err();
    assert!(matches!(err, ServiceError::Cancelled));
    assert_eq!(err.class(), ErrorClass::Cancelled);
}

#[test]
fn every_variant_survives_encode_then_decode() {
    let meeting_id = Uuid::new_v4();
    let contents = [
        ItemContent::Blank,
        ItemContent::Message(MessageContent {
            primary_text: "Opening".to_string(),
            secondary_text: Some("Hymn 2".to_string()),
        }),
        ItemContent::Speaker(SpeakerContent {
            speaker_name: "Sister Okafor".to_string(),
            title: Some("Gratitude".to_string()),
            expected_duration: Some(420),
        }),
        ItemContent::Lyrics(LyricsContent {
            hymn_id: "hymn-85".to_string(),
            show_translation: false,
        }),
        ItemContent::Timer(TimerContent {
            show_meeting_details: true,
        }),
    ];

    for (order, content) in contents.into_iter().enumerate() {
        let item = AgendaItem::new(meeting_id, order as i64, content).with_role("Conducting");
        let decoded = decode_item(&encode_item(&item).unwrap()).unwrap();
        assert_eq!(decoded.id, Some(item.id));
        assert_eq!(decoded.into_item_or(Uuid::new_v4), item);
    }
}
