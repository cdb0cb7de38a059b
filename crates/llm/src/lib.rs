//! Remote intent classification over an OpenAI-style chat completions API.
//!
//! The classifier is strictly optional: callers try it first and fall back
//! to the keyword rules on any failure. Errors are split by what the caller
//! should do about them. [`RemoteError::Malformed`] means the service
//! answered but the answer is unusable; [`RemoteError::Transient`] means the
//! service never gave a usable answer at all. Both end in a rules fallback,
//! they just log differently.

use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use lale_core::{Action, IntentTag, RemoteSettings};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service responded but the payload is not a usable action.
    #[error("malformed remote response: {0}")]
    Malformed(String),
    /// Network trouble, rate limiting, or a server-side failure.
    #[error("transient remote failure: {0}")]
    Transient(String),
}

/// Chat-completions client for intent classification.
#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    client: reqwest::Client,
    settings: RemoteSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl RemoteClassifier {
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| RemoteError::Transient(err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn with_client(client: reqwest::Client, settings: RemoteSettings) -> Self {
        Self { client, settings }
    }

    /// Ask the remote model to classify `text` into an action.
    ///
    /// Single attempt, no retries. The caller decides how to log the two
    /// failure kinds before falling back to the rule classifier.
    #[instrument(skip(self, text), fields(model = %self.settings.model))]
    pub async fn classify(
        &self,
        text: &str,
        reference: DateTime<Tz>,
    ) -> Result<Action, RemoteError> {
        let prompt = system_prompt(reference);
        let request = ChatRequest {
            model: &self.settings.model,
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage { role: "system", content: &prompt },
                ChatMessage { role: "user", content: text },
            ],
        };

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(RemoteError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(RemoteError::Malformed(format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| RemoteError::Malformed(err.to_string()))?;
        let action = parse_completion(&body)?;
        debug!(intent = action.intent.as_tag(), "remote classification accepted");
        Ok(action)
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Transient(err.to_string())
}

/// Decode a chat-completions body into an action.
///
/// The model is instructed to answer with `{"intent": ..., "payload": ...}`;
/// anything else, including an intent tag outside the closed set, is
/// malformed.
fn parse_completion(body: &str) -> Result<Action, RemoteError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|err| RemoteError::Malformed(format!("response envelope: {err}")))?;
    let content = response
        .choices
        .first()
        .map(|choice| choice.message.content.as_str())
        .ok_or_else(|| RemoteError::Malformed("empty choices".to_string()))?;

    let value: Value = serde_json::from_str(content)
        .map_err(|err| RemoteError::Malformed(format!("content is not json: {err}")))?;
    let intent_tag = value
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::Malformed("missing intent field".to_string()))?;
    let intent = IntentTag::from_tag(intent_tag)
        .ok_or_else(|| RemoteError::Malformed(format!("unknown intent {intent_tag:?}")))?;
    let payload = match value.get("payload") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(other) => {
            return Err(RemoteError::Malformed(format!(
                "payload is not an object: {other}"
            )))
        }
    };
    Ok(Action::new(intent, payload))
}

/// Turkish instruction prompt. The reference date is embedded so the model
/// resolves relative phrases against the caller's clock, not its own.
fn system_prompt(reference: DateTime<Tz>) -> String {
    let today = reference.format("%Y-%m-%d");
    let weekday = turkish_weekday(&reference);
    format!(
        "Sen Türkçe bir kişisel asistan için komut çözümleyicisisin. \
         Bugünün tarihi {today} ({weekday}), saat dilimi {tz}. \
         Kullanıcının mesajını analiz et ve SADECE şu şemada geçerli bir JSON nesnesi döndür: \
         {{\"intent\": \"<etiket>\", \"payload\": {{...}}}}. \
         Geçerli intent etiketleri: add_event, add_task, note, list_events, list_tasks, \
         summarize_topic, ingest_docs, advise_on_topic, schedule_reminder, update_event, \
         update_task, delete_event, delete_task, complete_task. \
         Tarih ve saatleri UTC RFC 3339 biçiminde ver. \
         Etkinlikler için payload alanları: title, start, timezone, remind_policy. \
         Görevler için: title, due. Hatırlatıcılar için: message, remind_at. \
         Emin değilsen note kullan ve metni aynen aktar. JSON dışında hiçbir şey yazma.",
        tz = reference.timezone(),
    )
}

fn turkish_weekday(reference: &DateTime<Tz>) -> &'static str {
    use chrono::Datelike;
    match reference.weekday() {
        chrono::Weekday::Mon => "Pazartesi",
        chrono::Weekday::Tue => "Salı",
        chrono::Weekday::Wed => "Çarşamba",
        chrono::Weekday::Thu => "Perşembe",
        chrono::Weekday::Fri => "Cuma",
        chrono::Weekday::Sat => "Cumartesi",
        chrono::Weekday::Sun => "Pazar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn envelope(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn well_formed_completion_parses() {
        let body = envelope(
            r#"{"intent": "add_task", "payload": {"title": "Raporu bitir", "due": "2025-10-03T14:00:00+00:00"}}"#,
        );
        let action = parse_completion(&body).unwrap();
        assert_eq!(action.intent, IntentTag::AddTask);
        assert_eq!(action.payload["title"], serde_json::json!("Raporu bitir"));
    }

    #[test]
    fn add_note_alias_is_accepted() {
        let body = envelope(r#"{"intent": "add_note", "payload": {"text": "pazartesi fikirleri"}}"#);
        let action = parse_completion(&body).unwrap();
        assert_eq!(action.intent, IntentTag::Note);
    }

    #[test]
    fn unknown_intent_is_malformed() {
        let body = envelope(r#"{"intent": "launch_rocket", "payload": {}}"#);
        assert!(matches!(
            parse_completion(&body),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn prose_content_is_malformed() {
        let body = envelope("Elbette! Bunu bir görev olarak ekledim.");
        assert!(matches!(
            parse_completion(&body),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn missing_payload_defaults_to_empty_object() {
        let body = envelope(r#"{"intent": "list_events"}"#);
        let action = parse_completion(&body).unwrap();
        assert!(action.payload.is_empty());
    }

    #[test]
    fn scalar_payload_is_malformed() {
        let body = envelope(r#"{"intent": "note", "payload": "serbest metin"}"#);
        assert!(matches!(
            parse_completion(&body),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn prompt_embeds_reference_date() {
        let reference = chrono_tz::Europe::Istanbul
            .with_ymd_and_hms(2025, 10, 2, 9, 0, 0)
            .unwrap();
        let prompt = system_prompt(reference);
        assert!(prompt.contains("2025-10-02"));
        assert!(prompt.contains("Perşembe"));
        assert!(prompt.contains("Europe/Istanbul"));
    }
}
