//! Assistant orchestration: interpret text into an action, then execute it.
//!
//! Interpretation is call-first: when a remote classifier is configured it
//! gets one attempt, and any failure falls back to the keyword rules. The
//! rules are the availability floor, so interpretation itself never errors.
//! Execution is an exhaustive dispatch over the closed intent set.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use lale_core::{naive_to_utc, Action, IntentTag, RuleClassifier, Settings, TITLE_FALLBACK};
use lale_llm::{RemoteClassifier, RemoteError};
use lale_observability::AppMetrics;
use lale_storage::{
    CreateOutcome, EventPatch, EventRepository, NewEvent, NewNote, NewTask, NoteRepository,
    StorageError, TaskPatch, TaskRepository, TimeWindow,
};

const NOTE_TITLE_LIMIT: usize = 80;
const NOTE_TITLE_FALLBACK: &str = "Not";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome handed back to the caller: which intent ran, a user-facing
/// Turkish message, and the structured details behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub intent: IntentTag,
    pub message: String,
    pub data: Value,
}

impl Reply {
    fn new(intent: IntentTag, message: String, data: Value) -> Self {
        Self { intent, message, data }
    }
}

/// Side-channel for reminders; execution environments differ, so the
/// assistant only hands the reminder over.
pub trait ReminderPlanner {
    fn schedule(&self, message: &str, remind_at: Option<DateTime<Utc>>);
}

/// Document and topic knowledge boundary.
pub trait KnowledgeBase {
    fn ingest(&self, topic: &str) -> usize;
    fn summarize(&self, topic: &str) -> String;
    fn advise(&self, topic: &str) -> Vec<String>;
}

/// Planner that only records the request in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPlanner;

impl ReminderPlanner for LogPlanner {
    fn schedule(&self, message: &str, remind_at: Option<DateTime<Utc>>) {
        info!(reminder = message, ?remind_at, "reminder scheduled");
    }
}

/// Knowledge base with no corpus behind it; answers honestly that it has
/// nothing on file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyKnowledge;

impl KnowledgeBase for EmptyKnowledge {
    fn ingest(&self, topic: &str) -> usize {
        info!(topic, "ingest requested, no source configured");
        0
    }

    fn summarize(&self, topic: &str) -> String {
        format!("{topic} hakkında kayıtlı bir içerik bulunamadı.")
    }

    fn advise(&self, topic: &str) -> Vec<String> {
        vec![format!("{topic} için kayıtlı bir öneri yok.")]
    }
}

pub struct Assistant<S, P = LogPlanner, K = EmptyKnowledge> {
    store: S,
    settings: Settings,
    rules: RuleClassifier,
    remote: Option<RemoteClassifier>,
    planner: P,
    knowledge: K,
    metrics: Arc<AppMetrics>,
}

impl<S> Assistant<S>
where
    S: EventRepository + TaskRepository + NoteRepository,
{
    pub fn new(store: S, settings: Settings, remote: Option<RemoteClassifier>) -> Self {
        Self::with_parts(store, settings, remote, LogPlanner, EmptyKnowledge)
    }
}

impl<S, P, K> Assistant<S, P, K>
where
    S: EventRepository + TaskRepository + NoteRepository,
    P: ReminderPlanner,
    K: KnowledgeBase,
{
    pub fn with_parts(
        store: S,
        settings: Settings,
        remote: Option<RemoteClassifier>,
        planner: P,
        knowledge: K,
    ) -> Self {
        let rules = RuleClassifier::new(settings.clone());
        Self {
            store,
            settings,
            rules,
            remote,
            planner,
            knowledge,
            metrics: Arc::new(AppMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<AppMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Interpret and execute one utterance against the wall clock.
    pub async fn handle(&self, text: &str) -> Result<Reply, AssistantError> {
        let now = Utc::now().with_timezone(&self.settings.timezone());
        self.handle_at(text, now).await
    }

    /// Same as [`Assistant::handle`] with an injected clock.
    #[instrument(skip(self, text))]
    pub async fn handle_at(&self, text: &str, now: DateTime<Tz>) -> Result<Reply, AssistantError> {
        self.metrics.record_request();
        let started = Instant::now();
        let action = self.interpret(text, now).await;
        self.metrics.record_interpret_latency(started.elapsed());
        self.dispatch(action, now).await
    }

    /// Text to action. Remote first when configured, rules otherwise.
    /// Infallible: every failure path lands on the rule classifier.
    pub async fn interpret(&self, text: &str, now: DateTime<Tz>) -> Action {
        if let Some(remote) = &self.remote {
            self.metrics.record_remote_attempt();
            match remote.classify(text, now).await {
                Ok(action) => return action,
                Err(RemoteError::Malformed(reason)) => {
                    warn!(%reason, "remote answer unusable, falling back to rules");
                    self.metrics.record_remote_fallback();
                }
                Err(RemoteError::Transient(reason)) => {
                    warn!(%reason, "remote classifier unavailable, falling back to rules");
                    self.metrics.record_remote_fallback();
                }
            }
        }
        self.rules.classify(text, now)
    }

    /// Execute one action. Unknown payload keys are ignored; missing ones
    /// degrade to the documented fallbacks rather than erroring.
    pub async fn dispatch(&self, action: Action, now: DateTime<Tz>) -> Result<Reply, AssistantError> {
        let payload = &action.payload;
        match action.intent {
            IntentTag::AddEvent => self.add_event(payload).await,
            IntentTag::AddTask => self.add_task(payload).await,
            IntentTag::Note => self.add_note(payload).await,
            IntentTag::ListEvents => self.list_events(payload, now).await,
            IntentTag::ListTasks => self.list_tasks(payload).await,
            IntentTag::SummarizeTopic => Ok(self.summarize(payload)),
            IntentTag::IngestDocs => Ok(self.ingest(payload)),
            IntentTag::AdviseOnTopic => Ok(self.advise(payload)),
            IntentTag::ScheduleReminder => Ok(self.schedule_reminder(payload)),
            IntentTag::UpdateEvent => self.update_event(payload, now).await,
            IntentTag::UpdateTask => self.update_task(payload, now).await,
            IntentTag::DeleteEvent => self.delete_event(payload).await,
            IntentTag::DeleteTask => self.delete_task(payload).await,
            IntentTag::CompleteTask => self.complete_task(payload).await,
        }
    }

    async fn add_event(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let title = str_field(payload, "title")
            .unwrap_or(TITLE_FALLBACK)
            .to_string();
        let start = datetime_field(payload, "start");
        let timezone = str_field(payload, "timezone")
            .map(str::to_string)
            .or_else(|| start.map(|_| self.settings.timezone_name.clone()));

        // Overlap warning covers same-window events with a different title;
        // same-title collisions are handled by the store's duplicate guard.
        let mut conflict = None;
        if let Some(start) = start {
            let window = TimeWindow {
                start: start - Duration::hours(1),
                end: start + Duration::hours(1),
            };
            if let Some(other) = self
                .store
                .list_events(Some(window))
                .await?
                .into_iter()
                .find(|rec| rec.title != title)
            {
                conflict = Some(other.title);
            }
        }

        let remind_policy = payload.get("remind_policy").cloned();
        let outcome = self
            .store
            .create_event(NewEvent {
                title: title.clone(),
                start,
                timezone,
                remind_policy: remind_policy.clone(),
            })
            .await?;

        // Fan the reminder offsets out to the planner, fresh inserts only.
        if !outcome.duplicate {
            if let Some(start) = start {
                for minutes in remind_offsets(remind_policy.as_ref(), &self.settings) {
                    self.planner.schedule(
                        &format!("Hatırlatma: {title}"),
                        Some(start - Duration::minutes(minutes as i64)),
                    );
                }
            }
        }

        Ok(self.creation_reply(
            IntentTag::AddEvent,
            "event_id",
            outcome,
            match (outcome.duplicate, conflict) {
                (true, _) => format!("Bu etkinlik zaten kayıtlı (#{}).", outcome.id),
                (false, Some(other)) => format!(
                    "Etkinlik eklendi (#{}): {title}. Dikkat: aynı saatlerde \"{other}\" ile çakışıyor.",
                    outcome.id
                ),
                (false, None) => format!("Etkinlik eklendi (#{}): {title}.", outcome.id),
            },
        ))
    }

    async fn add_task(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let title = str_field(payload, "title")
            .unwrap_or(TITLE_FALLBACK)
            .to_string();
        let outcome = self
            .store
            .create_task(NewTask { title: title.clone(), due: datetime_field(payload, "due") })
            .await?;

        Ok(self.creation_reply(
            IntentTag::AddTask,
            "task_id",
            outcome,
            if outcome.duplicate {
                format!("Bu görev zaten listede (#{}).", outcome.id)
            } else {
                format!("Görev eklendi (#{}): {title}.", outcome.id)
            },
        ))
    }

    fn creation_reply(
        &self,
        intent: IntentTag,
        id_key: &str,
        outcome: CreateOutcome,
        message: String,
    ) -> Reply {
        if outcome.duplicate {
            self.metrics.record_dedup_hit();
        }
        let mut data = Map::new();
        data.insert(id_key.to_string(), json!(outcome.id));
        data.insert("duplicate".to_string(), json!(outcome.duplicate));
        Reply::new(intent, message, Value::Object(data))
    }

    async fn add_note(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let body = str_field(payload, "text").unwrap_or_default().to_string();
        let title = note_title(&body);
        let id = self
            .store
            .create_note(NewNote { title: title.clone(), body })
            .await?;
        Ok(Reply::new(
            IntentTag::Note,
            format!("Not alındı (#{id}): {title}."),
            json!({ "note_id": id }),
        ))
    }

    async fn list_events(
        &self,
        payload: &Map<String, Value>,
        now: DateTime<Tz>,
    ) -> Result<Reply, AssistantError> {
        let range = str_field(payload, "range").unwrap_or("today");
        let window = range_window(range, now);
        let events = self.store.list_events(window).await?;
        let message = if events.is_empty() {
            "Ajandada kayıt yok.".to_string()
        } else {
            format!("{} etkinlik bulundu.", events.len())
        };
        Ok(Reply::new(
            IntentTag::ListEvents,
            message,
            json!({ "range": range, "events": events }),
        ))
    }

    async fn list_tasks(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let scope = str_field(payload, "scope").unwrap_or("today");
        let tasks = self.store.list_tasks(scope != "all").await?;
        let message = if tasks.is_empty() {
            "Açık görev yok.".to_string()
        } else {
            format!("{} görev listelendi.", tasks.len())
        };
        Ok(Reply::new(
            IntentTag::ListTasks,
            message,
            json!({ "scope": scope, "tasks": tasks }),
        ))
    }

    fn summarize(&self, payload: &Map<String, Value>) -> Reply {
        let topic = str_field(payload, "topic").unwrap_or_default();
        let summary = self.knowledge.summarize(topic);
        Reply::new(
            IntentTag::SummarizeTopic,
            summary.clone(),
            json!({ "topic": topic, "summary": summary }),
        )
    }

    fn ingest(&self, payload: &Map<String, Value>) -> Reply {
        let topic = str_field(payload, "topic").unwrap_or_default();
        let ingested = self.knowledge.ingest(topic);
        Reply::new(
            IntentTag::IngestDocs,
            format!("{ingested} belge işlendi."),
            json!({ "topic": topic, "ingested": ingested }),
        )
    }

    fn advise(&self, payload: &Map<String, Value>) -> Reply {
        let topic = str_field(payload, "topic").unwrap_or_default();
        let suggestions = self.knowledge.advise(topic);
        Reply::new(
            IntentTag::AdviseOnTopic,
            suggestions.join(" "),
            json!({ "topic": topic, "suggestions": suggestions }),
        )
    }

    fn schedule_reminder(&self, payload: &Map<String, Value>) -> Reply {
        let message = str_field(payload, "message").unwrap_or_default().to_string();
        let remind_at = datetime_field(payload, "remind_at");
        self.planner.schedule(&message, remind_at);
        let reply_message = match remind_at {
            Some(at) => format!(
                "Hatırlatıcı kuruldu: {}.",
                at.with_timezone(&self.settings.timezone()).format("%d.%m.%Y %H:%M")
            ),
            None => "Hatırlatıcı kuruldu.".to_string(),
        };
        Reply::new(
            IntentTag::ScheduleReminder,
            reply_message,
            json!({ "message": message, "remind_at": remind_at.map(|at| at.to_rfc3339()) }),
        )
    }

    async fn update_event(
        &self,
        payload: &Map<String, Value>,
        now: DateTime<Tz>,
    ) -> Result<Reply, AssistantError> {
        let Some(id) = id_field(payload, "event_id") else {
            return Ok(missing_id_reply(
                IntentTag::UpdateEvent,
                "updated",
                "Güncellenecek etkinlik belirtilmedi.",
            ));
        };
        // Explicit fields win; a bare utterance falls back to re-extraction.
        let patch = EventPatch {
            title: str_field(payload, "title").map(str::to_string),
            start: datetime_field(payload, "start").or_else(|| {
                str_field(payload, "text")
                    .and_then(|text| lale_core::extract(text, now, None))
                    .map(lale_core::to_utc)
            }),
        };
        let updated = self.store.update_event(id, patch).await?;
        Ok(update_reply(IntentTag::UpdateEvent, "event_id", "etkinlik", id, updated))
    }

    async fn update_task(
        &self,
        payload: &Map<String, Value>,
        now: DateTime<Tz>,
    ) -> Result<Reply, AssistantError> {
        let Some(id) = id_field(payload, "task_id") else {
            return Ok(missing_id_reply(
                IntentTag::UpdateTask,
                "updated",
                "Güncellenecek görev belirtilmedi.",
            ));
        };
        let patch = TaskPatch {
            title: str_field(payload, "title").map(str::to_string),
            due: datetime_field(payload, "due").or_else(|| {
                str_field(payload, "text")
                    .and_then(|text| lale_core::extract(text, now, None))
                    .map(lale_core::to_utc)
            }),
        };
        let updated = self.store.update_task(id, patch).await?;
        Ok(update_reply(IntentTag::UpdateTask, "task_id", "görev", id, updated))
    }

    async fn delete_event(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let Some(id) = id_field(payload, "event_id") else {
            return Ok(missing_id_reply(
                IntentTag::DeleteEvent,
                "deleted",
                "Silinecek etkinlik belirtilmedi.",
            ));
        };
        let deleted = self.store.delete_event(id).await?;
        let message = if deleted {
            format!("Etkinlik silindi (#{id}).")
        } else {
            format!("#{id} numaralı etkinlik bulunamadı.")
        };
        Ok(Reply::new(
            IntentTag::DeleteEvent,
            message,
            json!({ "event_id": id, "deleted": deleted }),
        ))
    }

    async fn delete_task(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let Some(id) = id_field(payload, "task_id") else {
            return Ok(missing_id_reply(
                IntentTag::DeleteTask,
                "deleted",
                "Silinecek görev belirtilmedi.",
            ));
        };
        let deleted = self.store.delete_task(id).await?;
        let message = if deleted {
            format!("Görev silindi (#{id}).")
        } else {
            format!("#{id} numaralı görev bulunamadı.")
        };
        Ok(Reply::new(
            IntentTag::DeleteTask,
            message,
            json!({ "task_id": id, "deleted": deleted }),
        ))
    }

    async fn complete_task(&self, payload: &Map<String, Value>) -> Result<Reply, AssistantError> {
        let Some(id) = id_field(payload, "task_id") else {
            return Ok(missing_id_reply(
                IntentTag::CompleteTask,
                "completed",
                "Tamamlanacak görev belirtilmedi.",
            ));
        };
        let completed = self.store.complete_task(id).await?;
        let message = if completed {
            format!("Görev tamamlandı (#{id}).")
        } else {
            format!("#{id} numaralı görev bulunamadı.")
        };
        Ok(Reply::new(
            IntentTag::CompleteTask,
            message,
            json!({ "task_id": id, "completed": completed }),
        ))
    }
}

fn str_field<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

fn datetime_field(payload: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let text = payload.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn id_field(payload: &Map<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Offsets in minutes before the event start, from the payload policy or
/// the configured defaults.
fn remind_offsets(policy: Option<&Value>, settings: &Settings) -> Vec<u32> {
    policy
        .and_then(|value| value.get("minutes_before"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_u64)
                .map(|minutes| minutes as u32)
                .collect()
        })
        .unwrap_or_else(|| settings.default_reminders.clone())
}

/// First line of the body, truncated on a char boundary.
fn note_title(body: &str) -> String {
    let first_line = body.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return NOTE_TITLE_FALLBACK.to_string();
    }
    first_line.chars().take(NOTE_TITLE_LIMIT).collect()
}

/// Map a range hint onto a UTC window anchored at local midnight.
fn range_window(range: &str, now: DateTime<Tz>) -> Option<TimeWindow> {
    let tz = now.timezone();
    let day_start = now.date_naive().and_hms_opt(0, 0, 0)?;
    let start = naive_to_utc(day_start, tz)?;
    match range {
        "today" => Some(TimeWindow { start, end: start + Duration::days(1) }),
        "week" => Some(TimeWindow { start, end: start + Duration::days(7) }),
        "month" => Some(TimeWindow { start, end: start + Duration::days(30) }),
        "upcoming" => Some(TimeWindow {
            start: now.with_timezone(&Utc),
            end: now.with_timezone(&Utc) + Duration::days(365),
        }),
        _ => None,
    }
}

fn missing_id_reply(intent: IntentTag, flag: &str, message: &str) -> Reply {
    let mut data = Map::new();
    data.insert(flag.to_string(), json!(false));
    Reply::new(intent, message.to_string(), Value::Object(data))
}

fn update_reply(intent: IntentTag, id_key: &str, noun: &str, id: i64, updated: bool) -> Reply {
    let message = if updated {
        format!("Kayıt güncellendi (#{id}).")
    } else {
        format!("#{id} numaralı {noun} bulunamadı.")
    };
    let mut data = Map::new();
    data.insert(id_key.to_string(), json!(id));
    data.insert("updated".to_string(), json!(updated));
    Reply::new(intent, message, Value::Object(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lale_storage::MemoryStore;

    fn assistant() -> Assistant<MemoryStore> {
        Assistant::new(MemoryStore::new(), Settings::default(), None)
    }

    fn reference() -> DateTime<Tz> {
        chrono_tz::Europe::Istanbul
            .with_ymd_and_hms(2025, 10, 2, 9, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn event_flow_end_to_end() {
        let assistant = assistant();
        let reply = assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::AddEvent);
        assert_eq!(reply.data["duplicate"], json!(false));

        let listed = assistant
            .dispatch(
                Action::new(IntentTag::ListEvents, {
                    let mut payload = Map::new();
                    payload.insert("range".into(), json!("week"));
                    payload
                }),
                reference(),
            )
            .await
            .unwrap();
        assert_eq!(listed.data["events"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_utterance_hits_duplicate_guard() {
        let assistant = assistant();
        let first = assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        let second = assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        assert_eq!(second.data["duplicate"], json!(true));
        assert_eq!(second.data["event_id"], first.data["event_id"]);
        assert_eq!(assistant.metrics().snapshot().dedup_hits, 1);
    }

    #[tokio::test]
    async fn overlapping_different_title_warns_but_creates() {
        let assistant = assistant();
        assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        let reply = assistant
            .handle_at("Yarın saat 14 te bütçe görüşmesi", reference())
            .await
            .unwrap();
        assert_eq!(reply.data["duplicate"], json!(false));
        assert!(reply.message.contains("çakışıyor"));
    }

    #[tokio::test]
    async fn unmatched_text_lands_as_note() {
        let assistant = assistant();
        let reply = assistant
            .handle_at("dün ilginç bir rüya gördüm", reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::Note);
        assert!(reply.message.contains("dün ilginç bir rüya gördüm"));
    }

    #[tokio::test]
    async fn long_note_title_is_truncated() {
        let assistant = assistant();
        let body = "a".repeat(200);
        let reply = assistant.handle_at(&body, reference()).await.unwrap();
        assert_eq!(reply.intent, IntentTag::Note);
        // Message embeds the truncated title.
        assert!(reply.message.len() < 200);
    }

    #[tokio::test]
    async fn completing_missing_task_reports_not_found() {
        let assistant = assistant();
        let reply = assistant
            .handle_at("42 numaralı görevi tamamla", reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::CompleteTask);
        assert_eq!(reply.data["completed"], json!(false));
    }

    #[tokio::test]
    async fn task_create_and_complete() {
        let assistant = assistant();
        let created = assistant.handle_at("Yeni görev ekle", reference()).await.unwrap();
        assert_eq!(created.intent, IntentTag::AddTask);
        let id = created.data["task_id"].as_i64().unwrap();

        let completed = assistant
            .handle_at(&format!("{id} numaralı görevi tamamla"), reference())
            .await
            .unwrap();
        assert_eq!(completed.data["completed"], json!(true));
    }

    #[tokio::test]
    async fn reminder_flows_through_planner() {
        let assistant = assistant();
        let reply = assistant
            .handle_at("Akşam saat 9 da poyrazı terminalden almayı hatırlat", reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::ScheduleReminder);
        assert_eq!(
            reply.data["remind_at"],
            json!("2025-10-02T18:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn explicit_start_field_moves_the_event() {
        let assistant = assistant();
        let created = assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        let id = created.data["event_id"].as_i64().unwrap();

        let mut payload = Map::new();
        payload.insert("event_id".into(), json!(id));
        payload.insert("start".into(), json!("2025-10-05T08:00:00+00:00"));
        let reply = assistant
            .dispatch(Action::new(IntentTag::UpdateEvent, payload), reference())
            .await
            .unwrap();
        assert_eq!(reply.data["updated"], json!(true));
        assert_eq!(reply.data["event_id"], json!(id));

        let mut list = Map::new();
        list.insert("range".into(), json!("month"));
        let listed = assistant
            .dispatch(Action::new(IntentTag::ListEvents, list), reference())
            .await
            .unwrap();
        let events = listed.data["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["start"], json!("2025-10-05T08:00:00Z"));
    }

    #[tokio::test]
    async fn explicit_task_fields_update_title_and_due() {
        let assistant = assistant();
        let created = assistant.handle_at("Yeni görev ekle", reference()).await.unwrap();
        let id = created.data["task_id"].as_i64().unwrap();

        let mut payload = Map::new();
        payload.insert("task_id".into(), json!(id));
        payload.insert("title".into(), json!("Raporu gönder"));
        payload.insert("due".into(), json!("2025-10-04T09:00:00+00:00"));
        let reply = assistant
            .dispatch(Action::new(IntentTag::UpdateTask, payload), reference())
            .await
            .unwrap();
        assert_eq!(reply.data["updated"], json!(true));
        assert_eq!(reply.data["task_id"], json!(id));

        let mut list = Map::new();
        list.insert("scope".into(), json!("all"));
        let listed = assistant
            .dispatch(Action::new(IntentTag::ListTasks, list), reference())
            .await
            .unwrap();
        let tasks = listed.data["tasks"].as_array().unwrap();
        assert_eq!(tasks[0]["title"], json!("Raporu gönder"));
        assert_eq!(tasks[0]["due"], json!("2025-10-04T09:00:00Z"));
    }

    #[tokio::test]
    async fn utterance_update_reextracts_start_from_text() {
        let assistant = assistant();
        let created = assistant
            .handle_at("Yarın saat 14 te tedarikçi toplantısı", reference())
            .await
            .unwrap();
        let id = created.data["event_id"].as_i64().unwrap();

        let reply = assistant
            .handle_at(&format!("etkinliği {id} yarın 16 da güncelle"), reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::UpdateEvent);
        assert_eq!(reply.data["updated"], json!(true));

        let mut list = Map::new();
        list.insert("range".into(), json!("month"));
        let listed = assistant
            .dispatch(Action::new(IntentTag::ListEvents, list), reference())
            .await
            .unwrap();
        // 16:00 Istanbul is 13:00 UTC.
        assert_eq!(
            listed.data["events"].as_array().unwrap()[0]["start"],
            json!("2025-10-03T13:00:00Z")
        );
    }

    #[tokio::test]
    async fn missing_id_flag_matches_the_intent() {
        let assistant = assistant();
        let cases = [
            (IntentTag::UpdateEvent, "updated"),
            (IntentTag::UpdateTask, "updated"),
            (IntentTag::DeleteEvent, "deleted"),
            (IntentTag::DeleteTask, "deleted"),
            (IntentTag::CompleteTask, "completed"),
        ];
        for (intent, flag) in cases {
            let reply = assistant
                .dispatch(Action::new(intent, Map::new()), reference())
                .await
                .unwrap();
            assert_eq!(reply.data[flag], json!(false), "{intent:?}");
        }
    }

    #[tokio::test]
    async fn remote_shaped_action_dispatches_like_local() {
        let assistant = assistant();
        let mut payload = Map::new();
        payload.insert("title".into(), json!("Uzaktan gelen görev"));
        payload.insert("due".into(), json!("2025-10-03T14:00:00+00:00"));
        let reply = assistant
            .dispatch(Action::new(IntentTag::AddTask, payload), reference())
            .await
            .unwrap();
        assert_eq!(reply.intent, IntentTag::AddTask);
        assert_eq!(reply.data["duplicate"], json!(false));
    }
}
