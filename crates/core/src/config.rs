use std::env;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: &str = "Europe/Istanbul";
pub const DEFAULT_REMINDERS: [u32; 3] = [1440, 60, 10];
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub timezone_name: String,
    pub default_reminders: Vec<u32>,
    pub remote: Option<RemoteSettings>,
}

/// Remote-classifier configuration; present only when the feature is
/// enabled and a credential is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone_name: DEFAULT_TIMEZONE.to_string(),
            default_reminders: DEFAULT_REMINDERS.to_vec(),
            remote: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let timezone_name = env::var("LALE_TZ")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        let default_reminders = env::var("LALE_REMINDERS")
            .ok()
            .and_then(|value| serde_json::from_str::<Vec<u32>>(&value).ok())
            .filter(|values| !values.is_empty())
            .unwrap_or_else(|| DEFAULT_REMINDERS.to_vec());

        let use_remote = env::var("LALE_USE_REMOTE")
            .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let api_key = env::var("LALE_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|value| !value.trim().is_empty());

        let remote = match (use_remote, api_key) {
            (true, Some(api_key)) => Some(RemoteSettings {
                api_key,
                model: env::var("LALE_LLM_MODEL")
                    .unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
                base_url: env::var("LALE_LLM_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            }),
            _ => None,
        };

        Self {
            timezone_name,
            default_reminders,
            remote,
        }
    }

    /// Configured local zone, falling back to Istanbul on bad names.
    pub fn timezone(&self) -> Tz {
        self.timezone_name
            .parse()
            .unwrap_or(chrono_tz::Europe::Istanbul)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_use_istanbul() {
        let settings = Settings::default();
        assert_eq!(settings.timezone(), chrono_tz::Europe::Istanbul);
        assert_eq!(settings.default_reminders, vec![1440, 60, 10]);
        assert!(settings.remote.is_none());
    }

    #[test]
    fn bad_timezone_name_falls_back() {
        let settings = Settings {
            timezone_name: "Mars/Olympus".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.timezone(), chrono_tz::Europe::Istanbul);
    }
}
