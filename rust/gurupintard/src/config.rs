use std::path::PathBuf;
use std::time::Duration;

/// Key of the single JSON document holding the whole snapshot.
pub const STORAGE_KEY: &str = "guruPintarData";
/// Unparsable documents are moved here instead of being overwritten.
pub const CORRUPT_STORAGE_KEY: &str = "guruPintarData.corrupt";
pub const DB_FILE_NAME: &str = "gurupintar.sqlite3";

pub const DEFAULT_AI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_AI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;

/// Upper bound on grade values sent with a class-trend insight prompt.
pub const INSIGHT_SAMPLE_LIMIT: usize = 100;

pub const DEMO_TEACHER_EMAIL: &str = "admin@sekolah.id";
pub const DEMO_TEACHER_PASSWORD: &str = "admin123";

pub const DEFAULT_LOG_FILTER: &str = "gurupintard=info";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Opened at startup when set, so a UI can skip `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub ai: AiConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = non_empty("GURUPINTAR_AI_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_AI_TIMEOUT_SECS);

        Self {
            workspace: non_empty("GURUPINTAR_WORKSPACE").map(PathBuf::from),
            ai: AiConfig {
                api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")),
                model: non_empty("GURUPINTAR_AI_MODEL")
                    .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                endpoint: non_empty("GURUPINTAR_AI_ENDPOINT")
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_AI_ENDPOINT.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
        }
    }
}
