//! Keyword rule classifier.
//!
//! An ordered decision list over lowercase substring triggers. The first
//! matching rule wins, so overlapping vocabularies (e.g. "toplantı" vs the
//! generic add hints) resolve deterministically. Always returns an action;
//! unmatched text degrades to a note.

use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::{json, Map};
use tracing::debug;

use crate::config::Settings;
use crate::models::{Action, IntentTag};
use crate::payload::{
    build_event_action, build_reminder_action, build_task_action, event_default_hour,
    extract_number, extract_topic,
};
use crate::temporal::extract;

/// How a matched rule turns the text into an action.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Event { default_hour: u32 },
    Reminder,
    ListEvents,
    IngestDocs,
    SummarizeTopic,
    AdviseOnTopic,
    ListTasks,
    AddHint,
    Update,
    Delete,
    Complete,
    Task,
}

/// Substring trigger over the lowercased text.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    /// Fires when any keyword occurs.
    AnyOf(&'static [&'static str]),
    /// Fires only when every group contributes at least one keyword.
    AllGroups(&'static [&'static [&'static str]]),
}

impl Trigger {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Self::AnyOf(keywords) => keywords.iter().any(|kw| lowered.contains(kw)),
            Self::AllGroups(groups) => groups
                .iter()
                .all(|group| group.iter().any(|kw| lowered.contains(kw))),
        }
    }
}

struct Rule {
    trigger: Trigger,
    outcome: Outcome,
}

const RULES: &[Rule] = &[
    Rule { trigger: Trigger::AnyOf(&["toplant"]), outcome: Outcome::Event { default_hour: 10 } },
    Rule { trigger: Trigger::AnyOf(&["görüş"]), outcome: Outcome::Event { default_hour: 10 } },
    Rule { trigger: Trigger::AnyOf(&["konferans"]), outcome: Outcome::Event { default_hour: 10 } },
    Rule { trigger: Trigger::AnyOf(&["etkinlik"]), outcome: Outcome::Event { default_hour: 20 } },
    Rule { trigger: Trigger::AnyOf(&["konser"]), outcome: Outcome::Event { default_hour: 20 } },
    Rule { trigger: Trigger::AnyOf(&["sunum"]), outcome: Outcome::Event { default_hour: 10 } },
    Rule { trigger: Trigger::AnyOf(&["hatırlat", "alarm"]), outcome: Outcome::Reminder },
    Rule {
        trigger: Trigger::AnyOf(&["ajanda", "takvim", "etkinlikler", "bugün"]),
        outcome: Outcome::ListEvents,
    },
    Rule {
        trigger: Trigger::AllGroups(&[
            &["belge", "belgeleri", "dosya", "dosyaları", "dokuman", "doküman"],
            &["yükle", "ekle", "aktar", "arşivle"],
        ]),
        outcome: Outcome::IngestDocs,
    },
    Rule { trigger: Trigger::AnyOf(&["özet", "toparla"]), outcome: Outcome::SummarizeTopic },
    Rule { trigger: Trigger::AnyOf(&["öner", "uyarı", "kontrol"]), outcome: Outcome::AdviseOnTopic },
    Rule {
        trigger: Trigger::AnyOf(&["görevleri", "yapılacak", "todo", "liste"]),
        outcome: Outcome::ListTasks,
    },
    Rule { trigger: Trigger::AnyOf(&["ekle", "oluştur", "kaydet"]), outcome: Outcome::AddHint },
    Rule { trigger: Trigger::AnyOf(&["güncelle", "değiştir"]), outcome: Outcome::Update },
    Rule { trigger: Trigger::AnyOf(&["sil", "iptal"]), outcome: Outcome::Delete },
    Rule { trigger: Trigger::AnyOf(&["tamamla", "bitir", "kapattım"]), outcome: Outcome::Complete },
    Rule {
        trigger: Trigger::AnyOf(&["yap", "görev", "task", "hatırla", "tamamla"]),
        outcome: Outcome::Task,
    },
];

/// Deterministic keyword classifier. Cheap, offline, and the availability
/// floor when the remote classifier is unavailable.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    settings: Settings,
}

impl RuleClassifier {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn classify(&self, text: &str, reference: DateTime<Tz>) -> Action {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();

        for (position, rule) in RULES.iter().enumerate() {
            if !rule.trigger.matches(&lowered) {
                continue;
            }
            debug!(rule = position, outcome = ?rule.outcome, "rule matched");
            return self.apply(rule.outcome, trimmed, &lowered, reference);
        }
        note_action(trimmed)
    }

    fn apply(
        &self,
        outcome: Outcome,
        trimmed: &str,
        lowered: &str,
        reference: DateTime<Tz>,
    ) -> Action {
        match outcome {
            Outcome::Event { default_hour } => {
                build_event_action(trimmed, default_hour, reference, &self.settings, None)
            }
            Outcome::Reminder => build_reminder_action(trimmed, reference),
            Outcome::ListEvents => {
                Action::new(IntentTag::ListEvents, single("range", json!("today")))
            }
            Outcome::IngestDocs => Action::new(
                IntentTag::IngestDocs,
                single("topic", json!(extract_topic(trimmed))),
            ),
            Outcome::SummarizeTopic => Action::new(
                IntentTag::SummarizeTopic,
                single("topic", json!(extract_topic(trimmed))),
            ),
            Outcome::AdviseOnTopic => Action::new(
                IntentTag::AdviseOnTopic,
                single("topic", json!(extract_topic(trimmed))),
            ),
            Outcome::ListTasks => Action::new(IntentTag::ListTasks, single("scope", json!("today"))),
            Outcome::AddHint => {
                // A date nearby tips the generic add verbs toward an event;
                // otherwise the text reads as a task.
                match extract(trimmed, reference, Some(event_default_hour())) {
                    Some(parsed) => build_event_action(
                        trimmed,
                        event_default_hour(),
                        reference,
                        &self.settings,
                        Some(parsed),
                    ),
                    None => build_task_action(trimmed, reference),
                }
            }
            Outcome::Update => {
                let id = extract_number(trimmed);
                let mut payload = Map::new();
                if lowered.contains("etkin") || lowered.contains("toplant") {
                    payload.insert("event_id".into(), json!(id));
                    payload.insert("text".into(), json!(trimmed));
                    Action::new(IntentTag::UpdateEvent, payload)
                } else {
                    payload.insert("task_id".into(), json!(id));
                    payload.insert("text".into(), json!(trimmed));
                    Action::new(IntentTag::UpdateTask, payload)
                }
            }
            Outcome::Delete => {
                let id = extract_number(trimmed);
                if lowered.contains("etkin") || lowered.contains("toplant") {
                    Action::new(IntentTag::DeleteEvent, single("event_id", json!(id)))
                } else {
                    Action::new(IntentTag::DeleteTask, single("task_id", json!(id)))
                }
            }
            Outcome::Complete => Action::new(
                IntentTag::CompleteTask,
                single("task_id", json!(extract_number(trimmed))),
            ),
            Outcome::Task => build_task_action(trimmed, reference),
        }
    }
}

fn note_action(trimmed: &str) -> Action {
    Action::new(IntentTag::Note, single("text", json!(trimmed)))
}

fn single(key: &str, value: serde_json::Value) -> Map<String, serde_json::Value> {
    let mut payload = Map::new();
    payload.insert(key.to_string(), value);
    payload
}
