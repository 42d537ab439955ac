use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::chat::{TurnSettings, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::health::HEALTH_INTERVAL;
use crate::stream::{clamp_thinking_time, DEFAULT_MAX_THINKING_TIME};

const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
const DEFAULT_SESSIONS_FILE: &str = "thinkchat_sessions.json";

/// Client settings, read from the environment (and `.env` when the binary loaded one).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub max_thinking_time: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub health_interval: Duration,
    pub sessions_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            max_thinking_time: DEFAULT_MAX_THINKING_TIME,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            health_interval: HEALTH_INTERVAL,
            sessions_file: PathBuf::from(DEFAULT_SESSIONS_FILE),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let thinking_secs = parse_or(&lookup, "THINKCHAT_MAX_THINKING_SECS", defaults.max_thinking_time.as_secs());
        let interval_secs = parse_or(&lookup, "THINKCHAT_HEALTH_INTERVAL_SECS", defaults.health_interval.as_secs());

        Self {
            api_base: lookup("THINKCHAT_API_BASE").unwrap_or(defaults.api_base),
            max_thinking_time: clamp_thinking_time(Duration::from_secs(thinking_secs)),
            max_tokens: parse_or(&lookup, "THINKCHAT_MAX_TOKENS", defaults.max_tokens),
            temperature: parse_or(&lookup, "THINKCHAT_TEMPERATURE", defaults.temperature),
            health_interval: Duration::from_secs(interval_secs.max(1)),
            sessions_file: lookup("THINKCHAT_SESSIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.sessions_file),
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_thinking_time: self.max_thinking_time,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={raw}");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.max_thinking_time, Duration::from_secs(10));
        assert_eq!(config.health_interval, Duration::from_secs(3));
    }

    #[test]
    fn clamps_thinking_time_and_ignores_garbage() {
        let config = config_from(&[
            ("THINKCHAT_MAX_THINKING_SECS", "120"),
            ("THINKCHAT_MAX_TOKENS", "lots"),
            ("THINKCHAT_TEMPERATURE", "0.2"),
        ]);
        assert_eq!(config.max_thinking_time, Duration::from_secs(30));
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.temperature, 0.2);
    }
}
