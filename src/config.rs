//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Which fallback responder answers turns the script cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    Static,
    Generative,
}

impl FromStr for FallbackMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "generative" => Ok(Self::Generative),
            other => Err(ConfigError::InvalidValue {
                key: "MEMOIR_FALLBACK".to_string(),
                message: format!("expected 'static' or 'generative', got '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Generative => write!(f, "generative"),
        }
    }
}

/// Interview engine configuration.
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    pub fallback: FallbackMode,
    /// Prior turns passed to the generative fallback as context.
    pub history_window: usize,
    /// Optional JSON catalog replacing the built-in curriculum.
    pub catalog_path: Option<PathBuf>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackMode::Static,
            history_window: 3,
            catalog_path: None,
        }
    }
}

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub interview: InterviewConfig,
    pub db_path: PathBuf,
    pub user_id: String,
    pub topic_index: usize,
    pub author_name: Option<String>,
    pub author_birth_year: Option<i32>,
    /// Directory for the daily rolling log file, if file logging is wanted.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: SecretString::from(""),
                model: "gemini-2.0-flash".to_string(),
            },
            interview: InterviewConfig::default(),
            db_path: PathBuf::from("./data/memoir.db"),
            user_id: "local-user".to_string(),
            topic_index: 0,
            author_name: None,
            author_birth_year: None,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Read `MEMOIR_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let llm = LlmConfig {
            api_key: SecretString::from(get("MEMOIR_GOOGLE_API_KEY").unwrap_or_default()),
            model: get("MEMOIR_MODEL").unwrap_or(defaults.llm.model),
        };

        let fallback = match get("MEMOIR_FALLBACK") {
            Some(value) => value.parse()?,
            None if llm.has_usable_key() => FallbackMode::Generative,
            None => FallbackMode::Static,
        };

        let interview = InterviewConfig {
            fallback,
            history_window: parse_opt(&get, "MEMOIR_HISTORY_WINDOW")?
                .unwrap_or(defaults.interview.history_window),
            catalog_path: get("MEMOIR_CATALOG_PATH").map(PathBuf::from),
        };

        Ok(Self {
            llm,
            interview,
            db_path: get("MEMOIR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            user_id: get("MEMOIR_USER").unwrap_or(defaults.user_id),
            topic_index: parse_opt(&get, "MEMOIR_TOPIC")?.unwrap_or(defaults.topic_index),
            author_name: get("MEMOIR_AUTHOR_NAME"),
            author_birth_year: parse_opt(&get, "MEMOIR_AUTHOR_BIRTH_YEAR")?,
            log_dir: get("MEMOIR_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_opt<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.llm.model, "gemini-2.0-flash");
        assert!(!cfg.llm.has_usable_key());
        assert_eq!(cfg.interview.fallback, FallbackMode::Static);
        assert_eq!(cfg.interview.history_window, 3);
        assert_eq!(cfg.db_path, PathBuf::from("./data/memoir.db"));
        assert_eq!(cfg.topic_index, 0);
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn usable_key_defaults_to_generative() {
        let cfg = config(&[("MEMOIR_GOOGLE_API_KEY", "AIzaSyRealKey")]).unwrap();
        assert_eq!(cfg.interview.fallback, FallbackMode::Generative);

        let dummy = config(&[("MEMOIR_GOOGLE_API_KEY", "AIzaSyDummyKey")]).unwrap();
        assert_eq!(dummy.interview.fallback, FallbackMode::Static);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let cfg = config(&[
            ("MEMOIR_GOOGLE_API_KEY", "AIzaSyRealKey"),
            ("MEMOIR_FALLBACK", "Static"),
            ("MEMOIR_HISTORY_WINDOW", "5"),
            ("MEMOIR_TOPIC", "4"),
            ("MEMOIR_USER", "grandma"),
            ("MEMOIR_AUTHOR_NAME", "Kim Younghee"),
            ("MEMOIR_AUTHOR_BIRTH_YEAR", "1948"),
            ("MEMOIR_CATALOG_PATH", "/etc/memoir/topics.json"),
        ])
        .unwrap();
        assert_eq!(cfg.interview.fallback, FallbackMode::Static);
        assert_eq!(cfg.interview.history_window, 5);
        assert_eq!(cfg.topic_index, 4);
        assert_eq!(cfg.user_id, "grandma");
        assert_eq!(cfg.author_name.as_deref(), Some("Kim Younghee"));
        assert_eq!(cfg.author_birth_year, Some(1948));
        assert_eq!(
            cfg.interview.catalog_path,
            Some(PathBuf::from("/etc/memoir/topics.json"))
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("MEMOIR_TOPIC", "first")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MEMOIR_TOPIC"));

        let err = config(&[("MEMOIR_FALLBACK", "magic")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MEMOIR_FALLBACK"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("MEMOIR_USER", "   "), ("MEMOIR_HISTORY_WINDOW", "")]).unwrap();
        assert_eq!(cfg.user_id, "local-user");
        assert_eq!(cfg.interview.history_window, 3);
    }
}
