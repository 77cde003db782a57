use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    runtime: RuntimeSettings,
    catalog: CatalogSettings,
    scoring: ScoringSettings,
    recorder: RecorderSettings,
    proctoring: ProctoringSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ProctoringSettings {
    pub reassert_fullscreen: bool,
    pub suppress_shortcuts: bool,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
    pub strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid base url for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = parse_environment(
            env_optional("EXAMROOM_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("EXAMROOM_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let catalog_base_url = env_or_default("CATALOG_BASE_URL", "http://localhost:8000/api/v1");
        let catalog_timeout_seconds = parse_u64(
            "CATALOG_TIMEOUT_SECONDS",
            env_or_default("CATALOG_TIMEOUT_SECONDS", "15"),
        )?;

        let scoring_base_url = env_or_default("SCORING_BASE_URL", "http://localhost:8000/api/v1");
        let scoring_api_key = env_or_default("SCORING_API_KEY", "");
        let scoring_timeout_seconds = parse_u64(
            "SCORING_TIMEOUT_SECONDS",
            env_or_default("SCORING_TIMEOUT_SECONDS", "30"),
        )?;

        let recorder_base_url = env_or_default("RECORDER_BASE_URL", "http://localhost:8000/api/v1");
        let recorder_timeout_seconds = parse_u64(
            "RECORDER_TIMEOUT_SECONDS",
            env_or_default("RECORDER_TIMEOUT_SECONDS", "10"),
        )?;

        let reassert_fullscreen = env_optional("PROCTOR_REASSERT_FULLSCREEN")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let suppress_shortcuts = env_optional("PROCTOR_SUPPRESS_SHORTCUTS")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);

        let log_level = env_or_default("EXAMROOM_LOG_LEVEL", "info");
        let json = env_optional("EXAMROOM_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            catalog: CatalogSettings {
                base_url: catalog_base_url,
                timeout_seconds: catalog_timeout_seconds,
            },
            scoring: ScoringSettings {
                base_url: scoring_base_url,
                api_key: scoring_api_key,
                timeout_seconds: scoring_timeout_seconds,
            },
            recorder: RecorderSettings {
                base_url: recorder_base_url,
                timeout_seconds: recorder_timeout_seconds,
            },
            proctoring: ProctoringSettings { reassert_fullscreen, suppress_shortcuts },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn catalog(&self) -> &CatalogSettings {
        &self.catalog
    }

    pub fn scoring(&self) -> &ScoringSettings {
        &self.scoring
    }

    pub fn recorder(&self) -> &RecorderSettings {
        &self.recorder
    }

    pub fn proctoring(&self) -> &ProctoringSettings {
        &self.proctoring
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CATALOG_TIMEOUT_SECONDS",
                value: String::from("0"),
            });
        }
        if self.scoring.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SCORING_TIMEOUT_SECONDS",
                value: String::from("0"),
            });
        }
        if self.recorder.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "RECORDER_TIMEOUT_SECONDS",
                value: String::from("0"),
            });
        }

        if !is_http_url(&self.catalog.base_url) {
            return Err(ConfigError::InvalidUrl {
                field: "CATALOG_BASE_URL",
                value: self.catalog.base_url.clone(),
            });
        }
        if !is_http_url(&self.scoring.base_url) {
            return Err(ConfigError::InvalidUrl {
                field: "SCORING_BASE_URL",
                value: self.scoring.base_url.clone(),
            });
        }
        if !is_http_url(&self.recorder.base_url) {
            return Err(ConfigError::InvalidUrl {
                field: "RECORDER_BASE_URL",
                value: self.recorder.base_url.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.scoring.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("SCORING_API_KEY"));
        }

        Ok(())
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
