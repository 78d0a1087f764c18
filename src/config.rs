//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;

/// Language every request is normalized into before extraction and matching
pub const PIVOT_LANGUAGE: &str = "English";

/// Sentinel returned by language identification when it cannot decide
pub const UNKNOWN_LANGUAGE: &str = "N/A";

/// Upper bound on the number of options presented per turn
pub const MAX_RECIPE_OPTIONS: usize = 3;

/// Number of corpus documents handed to the matcher
pub const CORPUS_SEARCH_LIMIT: usize = 10;

const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_STEPS: usize = 16;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    /// Gateway base URL; when set the key is implicit
    pub gateway: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub db_path: PathBuf,
    pub port: u16,
    pub image_dir: PathBuf,
    pub engine: EngineConfig,
}

/// Limits applied by the turn engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on every capability-provider call
    pub provider_timeout: Duration,
    /// Steps allowed in a single turn before it fails
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("SOUS_CHEF_DB_PATH").map_or_else(
            || {
                let home = non_empty("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.sous-chef/sous-chef.db"))
            },
            PathBuf::from,
        );

        let provider_timeout = non_empty("SOUS_CHEF_PROVIDER_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_PROVIDER_TIMEOUT, Duration::from_secs);

        let max_steps = non_empty("SOUS_CHEF_MAX_STEPS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_STEPS);

        Self {
            api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")),
            gateway: non_empty("LLM_GATEWAY"),
            text_model: non_empty("SOUS_CHEF_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: non_empty("SOUS_CHEF_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            db_path,
            port: non_empty("SOUS_CHEF_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            image_dir: non_empty("SOUS_CHEF_IMAGE_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            engine: EngineConfig {
                provider_timeout,
                max_steps,
            },
        }
    }

    /// Whether any model can be reached at all
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.gateway.is_some()
    }
}
