//! Core domain for the Lale assistant: action model, runtime settings,
//! Turkish text normalization, temporal extraction, and the keyword rule
//! classifier that every other crate builds on.

pub mod config;
pub mod intent;
pub mod models;
pub mod normalize;
pub mod payload;
pub mod temporal;

pub use config::{RemoteSettings, Settings};
pub use intent::RuleClassifier;
pub use models::{Action, IntentTag, RemindPolicy};
pub use normalize::normalize;
pub use payload::{
    build_event_action, build_reminder_action, build_task_action, extract_number, extract_topic,
    infer_title, TITLE_FALLBACK,
};
pub use temporal::{extract, naive_to_utc, to_utc};
