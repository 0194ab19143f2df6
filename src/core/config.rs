use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    http: HttpSettings,
    credentials: CredentialsSettings,
    exam: ExamSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(crate) base_url: String,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpSettings {
    pub(crate) timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct CredentialsSettings {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamSettings {
    pub(crate) refresh_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let base_url = env_or_default("EXAMPORT_API_BASE_URL", "http://localhost:5000/api");
        let timeout_seconds = parse_u64(
            "EXAMPORT_HTTP_TIMEOUT_SECONDS",
            env_or_default("EXAMPORT_HTTP_TIMEOUT_SECONDS", "30"),
        )?;

        let email = env_or_default("EXAMPORT_EMAIL", "");
        let password = env_or_default("EXAMPORT_PASSWORD", "");

        let refresh_interval_seconds = parse_u64(
            "EXAMPORT_REFRESH_INTERVAL_SECONDS",
            env_or_default("EXAMPORT_REFRESH_INTERVAL_SECONDS", "30"),
        )?;

        let log_level = env_or_default("EXAMPORT_LOG_LEVEL", "info");
        let json =
            env_optional("EXAMPORT_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings { base_url: normalize_base_url(base_url)? },
            http: HttpSettings { timeout_seconds },
            credentials: CredentialsSettings { email, password },
            exam: ExamSettings { refresh_interval_seconds },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server(&self) -> &ServerSettings {
        &self.server
    }

    pub(crate) fn http(&self) -> &HttpSettings {
        &self.http
    }

    pub(crate) fn credentials(&self) -> &CredentialsSettings {
        &self.credentials
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMPORT_HTTP_TIMEOUT_SECONDS",
                value: String::from("0"),
            });
        }
        if self.exam.refresh_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMPORT_REFRESH_INTERVAL_SECONDS",
                value: String::from("0"),
            });
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

fn normalize_base_url(value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(value));
    }
    Ok(trimmed.to_string())
}
