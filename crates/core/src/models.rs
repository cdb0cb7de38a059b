use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of commands the dispatcher knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    AddEvent,
    AddTask,
    Note,
    ListEvents,
    ListTasks,
    SummarizeTopic,
    IngestDocs,
    AdviseOnTopic,
    ScheduleReminder,
    UpdateEvent,
    UpdateTask,
    DeleteEvent,
    DeleteTask,
    CompleteTask,
}

impl IntentTag {
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim() {
            "add_event" => Some(Self::AddEvent),
            "add_task" => Some(Self::AddTask),
            "note" | "add_note" => Some(Self::Note),
            "list_events" => Some(Self::ListEvents),
            "list_tasks" => Some(Self::ListTasks),
            "summarize_topic" => Some(Self::SummarizeTopic),
            "ingest_docs" => Some(Self::IngestDocs),
            "advise_on_topic" => Some(Self::AdviseOnTopic),
            "schedule_reminder" => Some(Self::ScheduleReminder),
            "update_event" => Some(Self::UpdateEvent),
            "update_task" => Some(Self::UpdateTask),
            "delete_event" => Some(Self::DeleteEvent),
            "delete_task" => Some(Self::DeleteTask),
            "complete_task" => Some(Self::CompleteTask),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            Self::AddEvent => "add_event",
            Self::AddTask => "add_task",
            Self::Note => "note",
            Self::ListEvents => "list_events",
            Self::ListTasks => "list_tasks",
            Self::SummarizeTopic => "summarize_topic",
            Self::IngestDocs => "ingest_docs",
            Self::AdviseOnTopic => "advise_on_topic",
            Self::ScheduleReminder => "schedule_reminder",
            Self::UpdateEvent => "update_event",
            Self::UpdateTask => "update_task",
            Self::DeleteEvent => "delete_event",
            Self::DeleteTask => "delete_task",
            Self::CompleteTask => "complete_task",
        }
    }
}

/// Structured command: an intent plus the payload its handler reads.
///
/// Payload keys are ordered; unknown extra keys are tolerated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub intent: IntentTag,
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(intent: IntentTag, payload: Map<String, Value>) -> Self {
        Self { intent, payload }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "intent": self.intent.as_tag(),
            "payload": Value::Object(self.payload.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindPolicy {
    pub minutes_before: Vec<u32>,
    pub voice: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_tags_round_trip() {
        for tag in [
            "add_event",
            "add_task",
            "note",
            "list_events",
            "list_tasks",
            "summarize_topic",
            "ingest_docs",
            "advise_on_topic",
            "schedule_reminder",
            "update_event",
            "update_task",
            "delete_event",
            "delete_task",
            "complete_task",
        ] {
            let parsed = IntentTag::from_tag(tag).expect("known tag");
            assert_eq!(parsed.as_tag(), tag);
        }
    }

    #[test]
    fn add_note_aliases_to_note() {
        assert_eq!(IntentTag::from_tag("add_note"), Some(IntentTag::Note));
        assert_eq!(IntentTag::from_tag("do_magic"), None);
    }
}
