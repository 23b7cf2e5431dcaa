//! Runtime settings loaded from environment variables.

use std::path::PathBuf;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_ALLOWED_FILE_TYPES: &str = "pdf,doc,docx,txt,png,jpg,jpeg,gif,mp3,mp4,wav,mov";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SECRET_KEY must be set")]
    MissingSecretKey,
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Credentials and endpoint for one chat-completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Both provider slots. Which one is used is decided by which key is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiSettings {
    pub openai: ProviderConfig,
    pub openrouter: ProviderConfig,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            openai: ProviderConfig {
                api_key: None,
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
            },
            openrouter: ProviderConfig {
                api_key: None,
                base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
            },
        }
    }
}

/// When to regenerate tags on a note update that carries new content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetagPolicy {
    Never,
    /// Only when the note ends up with no tags.
    #[default]
    WhenEmpty,
    Always,
}

impl RetagPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "never" => Some(Self::Never),
            "when_empty" => Some(Self::WhenEmpty),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// When to re-detect the category on a note update that carries new content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecategorizePolicy {
    Never,
    /// Only when the note metadata has no category yet.
    WhenMissing,
    #[default]
    Always,
}

impl RecategorizePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "never" => Some(Self::Never),
            "when_missing" => Some(Self::WhenMissing),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentPolicy {
    pub auto_enrich_on_create: bool,
    pub retag_on_update: RetagPolicy,
    pub recategorize_on_update: RecategorizePolicy,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            auto_enrich_on_create: true,
            retag_on_update: RetagPolicy::default(),
            recategorize_on_update: RecategorizePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Explicit database location; `None` uses the platform data directory.
    pub database_path: Option<PathBuf>,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub ai: AiSettings,
    pub max_file_size_mb: u64,
    /// Lowercase extensions without the leading dot.
    pub allowed_file_types: Vec<String>,
    /// `None` means permissive CORS.
    pub cors_origins: Option<Vec<String>>,
    pub debug: bool,
    pub enrichment: EnrichmentPolicy,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = var("SECRET_KEY").ok_or(ConfigError::MissingSecretKey)?;

        let access_token_expire_minutes = match var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                value: v,
            })?,
            None => 30,
        };

        let max_file_size_mb = match var("MAX_FILE_SIZE_MB") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MAX_FILE_SIZE_MB",
                value: v,
            })?,
            None => 50,
        };

        let allowed_file_types = split_list(
            &var("ALLOWED_FILE_TYPES").unwrap_or_else(|| DEFAULT_ALLOWED_FILE_TYPES.to_string()),
        )
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

        let ai = AiSettings {
            openai: ProviderConfig {
                api_key: var("OPENAI_API_KEY"),
                base_url: var("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            openrouter: ProviderConfig {
                api_key: var("OPENROUTER_API_KEY"),
                base_url: var("OPENROUTER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
                model: var("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
        };

        let enrichment = EnrichmentPolicy {
            auto_enrich_on_create: match var("NOTEAI_AUTO_ENRICH") {
                Some(v) => parse_bool("NOTEAI_AUTO_ENRICH", v)?,
                None => true,
            },
            retag_on_update: match var("NOTEAI_RETAG_ON_UPDATE") {
                Some(v) => RetagPolicy::from_str(v.trim()).ok_or(ConfigError::Invalid {
                    var: "NOTEAI_RETAG_ON_UPDATE",
                    value: v,
                })?,
                None => RetagPolicy::default(),
            },
            recategorize_on_update: match var("NOTEAI_RECATEGORIZE_ON_UPDATE") {
                Some(v) => RecategorizePolicy::from_str(v.trim()).ok_or(ConfigError::Invalid {
                    var: "NOTEAI_RECATEGORIZE_ON_UPDATE",
                    value: v,
                })?,
                None => RecategorizePolicy::default(),
            },
        };

        Ok(Self {
            database_path: var("NOTEAI_DATABASE_PATH").map(PathBuf::from),
            secret_key,
            access_token_expire_minutes,
            ai,
            max_file_size_mb,
            allowed_file_types,
            cors_origins: var("CORS_ORIGINS").map(|s| split_list(&s)),
            debug: match var("DEBUG") {
                Some(v) => parse_bool("DEBUG", v)?,
                None => false,
            },
            enrichment,
        })
    }

    /// Settings with defaults everywhere except the signing secret.
    pub fn with_secret(secret_key: impl Into<String>) -> Self {
        Self {
            database_path: None,
            secret_key: secret_key.into(),
            access_token_expire_minutes: 30,
            ai: AiSettings::default(),
            max_file_size_mb: 50,
            allowed_file_types: split_list(DEFAULT_ALLOWED_FILE_TYPES),
            cors_origins: None,
            debug: false,
            enrichment: EnrichmentPolicy::default(),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn secret_key_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingSecretKey)));
        assert!(matches!(
            load(&[("SECRET_KEY", "  ")]),
            Err(ConfigError::MissingSecretKey)
        ));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = load(&[("SECRET_KEY", "s3cret")]).unwrap();
        assert_eq!(settings.access_token_expire_minutes, 30);
        assert_eq!(settings.max_file_size_mb, 50);
        assert_eq!(settings.max_file_size_bytes(), 50 * 1024 * 1024);
        assert!(settings.allowed_file_types.contains(&"txt".to_string()));
        assert_eq!(settings.ai, AiSettings::default());
        assert!(settings.cors_origins.is_none());
        assert!(!settings.debug);
        assert_eq!(settings.enrichment, EnrichmentPolicy::default());
    }

    #[test]
    fn huge_file_size_limits_saturate() {
        let max = u64::MAX.to_string();
        let settings = load(&[("SECRET_KEY", "s"), ("MAX_FILE_SIZE_MB", &max)]).unwrap();
        assert_eq!(settings.max_file_size_mb, u64::MAX);
        assert_eq!(settings.max_file_size_bytes(), u64::MAX);
    }

    #[test]
    fn provider_settings_come_from_env() {
        let settings = load(&[
            ("SECRET_KEY", "s"),
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENROUTER_MODEL", "meta/llama"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1"),
        ])
        .unwrap();
        assert_eq!(settings.ai.openrouter.api_key.as_deref(), Some("or-key"));
        assert_eq!(settings.ai.openrouter.model, "meta/llama");
        assert_eq!(settings.ai.openai.base_url, "http://localhost:9999/v1");
        assert!(settings.ai.openai.api_key.is_none());
    }

    #[test]
    fn enrichment_policy_is_configurable() {
        let settings = load(&[
            ("SECRET_KEY", "s"),
            ("NOTEAI_AUTO_ENRICH", "false"),
            ("NOTEAI_RETAG_ON_UPDATE", "always"),
            ("NOTEAI_RECATEGORIZE_ON_UPDATE", "when_missing"),
        ])
        .unwrap();
        assert!(!settings.enrichment.auto_enrich_on_create);
        assert_eq!(settings.enrichment.retag_on_update, RetagPolicy::Always);
        assert_eq!(
            settings.enrichment.recategorize_on_update,
            RecategorizePolicy::WhenMissing
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("SECRET_KEY", "s"), ("MAX_FILE_SIZE_MB", "lots")]),
            Err(ConfigError::Invalid { var: "MAX_FILE_SIZE_MB", .. })
        ));
        assert!(matches!(
            load(&[("SECRET_KEY", "s"), ("NOTEAI_RETAG_ON_UPDATE", "sometimes")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn lists_are_trimmed() {
        let settings = load(&[
            ("SECRET_KEY", "s"),
            ("ALLOWED_FILE_TYPES", " .TXT, md ,,"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
        ])
        .unwrap();
        assert_eq!(settings.allowed_file_types, vec!["txt", "md"]);
        assert_eq!(
            settings.cors_origins.unwrap(),
            vec!["http://a.test", "http://b.test"]
        );
    }
}
