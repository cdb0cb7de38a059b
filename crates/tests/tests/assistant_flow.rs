//! End-to-end flows through the assistant with the in-memory store.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use serde_json::json;

use lale_core::{IntentTag, Settings};
use lale_dispatch::Assistant;
use lale_storage::MemoryStore;

fn assistant() -> Assistant<MemoryStore> {
    Assistant::new(MemoryStore::new(), Settings::default(), None)
}

/// Thursday morning in Istanbul.
fn reference() -> DateTime<Tz> {
    chrono_tz::Europe::Istanbul
        .with_ymd_and_hms(2025, 10, 2, 9, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn meeting_utterance_creates_a_scheduled_event() {
    let assistant = assistant();
    let action = assistant
        .interpret("Yarın saat 14 te tedarikçi toplantısı", reference())
        .await;
    assert_eq!(action.intent, IntentTag::AddEvent);
    let keys: Vec<&String> = action.payload.keys().collect();
    assert_eq!(keys, ["title", "start", "timezone", "remind_policy"]);
    assert_eq!(action.payload["start"], json!("2025-10-03T11:00:00+00:00"));
    assert_eq!(action.payload["timezone"], json!("Europe/Istanbul"));
    assert_eq!(
        action.payload["remind_policy"],
        json!({"minutes_before": [1440, 60, 10], "voice": true})
    );

    let reply = assistant.dispatch(action, reference()).await.unwrap();
    assert_eq!(reply.data["duplicate"], json!(false));
}

#[tokio::test]
async fn repeating_an_utterance_does_not_create_twice() {
    let assistant = assistant();
    let first = assistant
        .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
        .await
        .unwrap();
    let second = assistant
        .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
        .await
        .unwrap();

    assert_eq!(first.data["duplicate"], json!(false));
    assert_eq!(second.data["duplicate"], json!(true));
    assert_eq!(second.data["event_id"], first.data["event_id"]);

    // The event sits on tomorrow, so list over the week.
    let mut payload = serde_json::Map::new();
    payload.insert("range".into(), json!("week"));
    let listed = assistant
        .dispatch(
            lale_core::Action::new(IntentTag::ListEvents, payload),
            reference(),
        )
        .await
        .unwrap();
    assert_eq!(listed.data["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn quarter_hour_apart_same_title_is_deduplicated() {
    let assistant = assistant();
    let action_at = |start: &str| {
        let mut payload = serde_json::Map::new();
        payload.insert("title".into(), json!("Fianca toplantısı"));
        payload.insert("start".into(), json!(start));
        payload.insert("timezone".into(), json!("Europe/Istanbul"));
        lale_core::Action::new(IntentTag::AddEvent, payload)
    };

    let first = assistant
        .dispatch(action_at("2025-10-03T11:00:00+00:00"), reference())
        .await
        .unwrap();
    let second = assistant
        .dispatch(action_at("2025-10-03T11:15:00+00:00"), reference())
        .await
        .unwrap();

    assert_eq!(first.data["duplicate"], json!(false));
    assert_eq!(second.data["duplicate"], json!(true));
    assert_eq!(second.data["event_id"], first.data["event_id"]);
}

#[tokio::test]
async fn day_ordinal_schedules_later_in_the_month() {
    let assistant = assistant();
    let action = assistant
        .interpret("22'si saat 10:00'da tedarikçi toplantısı", reference())
        .await;
    assert_eq!(action.intent, IntentTag::AddEvent);
    // 10:00 Istanbul on the 22nd is 07:00 UTC.
    assert_eq!(action.payload["start"], json!("2025-10-22T07:00:00+00:00"));
}

#[tokio::test]
async fn evening_reminder_lands_at_nine_pm() {
    let assistant = assistant();
    let reply = assistant
        .handle_at("Akşam saat 9 da poyrazı terminalden almayı hatırlat", reference())
        .await
        .unwrap();
    assert_eq!(reply.intent, IntentTag::ScheduleReminder);
    assert_eq!(reply.data["remind_at"], json!("2025-10-02T18:00:00+00:00"));
}

#[tokio::test]
async fn dateless_add_hint_becomes_a_task() {
    let assistant = assistant();
    let created = assistant
        .handle_at("Yeni görev ekle", reference())
        .await
        .unwrap();
    assert_eq!(created.intent, IntentTag::AddTask);

    let listed = assistant
        .handle_at("yapılacak işleri göster", reference())
        .await
        .unwrap();
    assert_eq!(listed.intent, IntentTag::ListTasks);
    let tasks = listed.data["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], json!("Yeni görev ekle"));
}

#[tokio::test]
async fn dated_add_hint_becomes_an_event() {
    let assistant = assistant();
    let reply = assistant
        .handle_at("yarın prova kaydet", reference())
        .await
        .unwrap();
    assert_eq!(reply.intent, IntentTag::AddEvent);

    let action = assistant.interpret("yarın prova kaydet", reference()).await;
    // Default evening slot, 18:00 Istanbul.
    assert_eq!(action.payload["start"], json!("2025-10-03T15:00:00+00:00"));
}

#[tokio::test]
async fn free_text_is_kept_as_a_note() {
    let assistant = assistant();
    let reply = assistant
        .handle_at("dün ilginç bir fikir geldi aklıma", reference())
        .await
        .unwrap();
    assert_eq!(reply.intent, IntentTag::Note);
    assert!(reply.data["note_id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn full_task_lifecycle() {
    let assistant = assistant();
    let created = assistant
        .handle_at("Raporu teslim etme görevi yap", reference())
        .await
        .unwrap();
    let id = created.data["task_id"].as_i64().unwrap();

    let completed = assistant
        .handle_at(&format!("{id} numaralı görevi tamamla"), reference())
        .await
        .unwrap();
    assert_eq!(completed.data["completed"], json!(true));

    let deleted = assistant
        .handle_at(&format!("görevi {id} sil"), reference())
        .await
        .unwrap();
    assert_eq!(deleted.intent, IntentTag::DeleteTask);
    assert_eq!(deleted.data["deleted"], json!(true));
}
