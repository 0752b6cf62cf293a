//! src/configuration.rs

use crate::error::error_chain_fmt;
use crate::utils::FrontendUrl;
use lettre::message::Mailbox;
use lettre::Address;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to load configuration.")]
    LoadError(#[from] config::ConfigError),
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl std::fmt::Debug for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl SettingsError {
    /// name of offending field, if validation (and not loading) failed
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SettingsError::InvalidField { field, .. } => Some(*field),
            SettingsError::LoadError(_) => None,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidField {
        field,
        reason: reason.into(),
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email: EmailSettings,
    pub frontend: FrontendSettings,
    #[serde(default)]
    pub log: LogSettings,
    pub secret: Secret<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// origins allowed by CORS, e.g. `http://localhost:4200`
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            // Try an encrypted connection, fallback to unencrypted if it fails
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db()
            .database(&self.database_name)
            .log_statements(tracing::log::LevelFilter::Trace)
    }

    /// Connection string assembled from host, port, credentials and database name.
    pub fn connection_uri(&self) -> Result<Secret<String>, SettingsError> {
        let mut uri = Url::parse(&format!("postgres://{}", self.host))
            .map_err(|e| invalid("database.host", e.to_string()))?;
        uri.set_port(Some(self.port))
            .map_err(|_| invalid("database.port", "cannot be applied to host"))?;
        uri.set_username(&self.username)
            .map_err(|_| invalid("database.username", "cannot be applied to host"))?;
        uri.set_password(Some(self.password.expose_secret()))
            .map_err(|_| invalid("database.password", "cannot be applied to host"))?;
        uri.set_path(&format!("/{}", self.database_name));
        Ok(Secret::new(uri.into()))
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct EmailSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub server: String,
    #[serde(default = "default_true")]
    pub starttls: bool,
    #[serde(default)]
    pub ssl_tls: bool,
    #[serde(default)]
    pub debug: bool,
    pub from: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default = "default_template_folder")]
    pub template_folder: PathBuf,
    #[serde(default)]
    pub suppress_send: bool,
    #[serde(default = "default_true")]
    pub use_credentials: bool,
    #[serde(default = "default_true")]
    pub validate_certs: bool,
    #[serde(
        default = "default_timeout_seconds",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_template_folder() -> PathBuf {
    PathBuf::from("templates/mails")
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Everything the mail transport needs, assembled from [`EmailSettings`].
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub server: String,
    pub starttls: bool,
    pub ssl_tls: bool,
    pub debug: bool,
    pub sender: Mailbox,
    pub template_folder: PathBuf,
    pub suppress_send: bool,
    pub use_credentials: bool,
    pub validate_certs: bool,
    pub timeout: Duration,
}

impl EmailSettings {
    pub fn smtp_config(&self) -> Result<SmtpConfig, SettingsError> {
        let address: Address = self
            .from
            .parse()
            .map_err(|_| invalid("email.from", format!("`{}` is not a valid email", self.from)))?;
        if self.starttls && self.ssl_tls {
            return Err(invalid(
                "email.ssl_tls",
                "implicit TLS cannot be combined with STARTTLS",
            ));
        }
        Ok(SmtpConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            server: self.server.clone(),
            starttls: self.starttls,
            ssl_tls: self.ssl_tls,
            debug: self.debug,
            sender: Mailbox::new(self.from_name.clone(), address),
            template_folder: self.template_folder.clone(),
            suppress_send: self.suppress_send,
            use_credentials: self.use_credentials,
            validate_certs: self.validate_certs,
            timeout: Duration::from_secs(self.timeout_seconds),
        })
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct FrontendSettings {
    pub base_url: String,
    pub verify_path: String,
    pub reset_password_path: String,
}

/// Either a numeric severity or a level name. Names are case-sensitive.
#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum LogLevel {
    Number(i64),
    Name(String),
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Number(20)
    }
}

impl LogLevel {
    pub fn severity(&self) -> Result<i64, SettingsError> {
        match self {
            LogLevel::Number(n) if *n >= 0 => Ok(*n),
            LogLevel::Number(n) => Err(invalid("log.level", format!("`{}` is negative", n))),
            LogLevel::Name(name) => match name.as_str() {
                "CRITICAL" | "FATAL" => Ok(50),
                "ERROR" => Ok(40),
                "WARNING" | "WARN" => Ok(30),
                "INFO" => Ok(20),
                "DEBUG" => Ok(10),
                "NOTSET" => Ok(0),
                other => Err(invalid(
                    "log.level",
                    format!("`{}` is not a known level", other),
                )),
            },
        }
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogHandler {
    Console,
    Null,
}

#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default = "default_log_handlers")]
    pub handlers: Vec<LogHandler>,
}

fn default_log_handlers() -> Vec<LogHandler> {
    vec![LogHandler::Console]
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            handlers: default_log_handlers(),
        }
    }
}

impl Settings {
    /// Deserialize and validate settings from any layered `config` source.
    pub fn try_from_config(config: config::Config) -> Result<Self, SettingsError> {
        let mut settings: Settings = config.try_deserialize()?;
        let severity = settings.log.level.severity()?;
        settings.log.level = LogLevel::Number(severity);
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.secret.expose_secret().is_empty() {
            return Err(invalid("secret", "must not be empty"));
        }
        for origin in self.application.cors_origins.iter() {
            Url::parse(origin).map_err(|e| invalid("application.cors_origins", e.to_string()))?;
        }
        FrontendUrl::parse(&self.frontend.base_url)
            .map_err(|e| invalid("frontend.base_url", e.to_string()))?;
        // derived fields must be assembled at least once
        self.database.connection_uri()?;
        self.email.smtp_config()?;
        Ok(())
    }
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, SettingsError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(|reason| invalid("APP_ENVIRONMENT", reason))?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Add in settings from environment variables (with a prefix of MIOLINGO and '__' as separator)
        // E.g. `MIOLINGO_DATABASE__HOST=db` would set `Settings.database.host`
        .add_source(
            config::Environment::with_prefix("MIOLINGO")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("log.handlers")
                .with_list_parse_key("application.cors_origins")
                .try_parsing(true),
        )
        .build()?;

    Settings::try_from_config(settings)
}
