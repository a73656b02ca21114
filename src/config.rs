use crate::error::{ErrorCode, ErrorDetail, TermResult};
use crate::frame::HostConfig;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "termwire.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub terminal: TerminalPreferences,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub environment: Environment,
    pub dev_port: u16,
    /// Page the terminal view is served from; production endpoints derive
    /// their scheme and authority from it.
    pub page_url: String,
    pub path_prefix: String,
    /// Explicit endpoint, bypassing environment-based selection.
    pub url: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            dev_port: 8082,
            page_url: "http://localhost/".to_string(),
            path_prefix: "/ssh/websocket/".to_string(),
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub resize_debounce_ms: u64,
    pub keepalive_interval_ms: u64,
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resize_debounce_ms: 140,
            keepalive_interval_ms: 30_000,
            default_cols: 80,
            default_rows: 24,
        }
    }
}

impl SessionConfig {
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }
}

/// Persisted user-interface preferences. Read-only to the transport.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TerminalPreferences {
    pub right_click_paste: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version = crate::version::VERSION, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Attach the local terminal to a remote shell through the broker.
    Attach(AttachArgs),
    /// Print the broker endpoint the current configuration resolves to.
    Endpoint(CommonArgs),
}

#[derive(Debug, Parser, Clone, Default)]
pub struct CommonArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub broker_url: Option<String>,
    #[arg(long)]
    pub environment: Option<Environment>,
    #[arg(long)]
    pub page_url: Option<String>,
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct AttachArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// JSON file holding a host record; flags below override its fields.
    #[arg(long)]
    pub host_file: Option<PathBuf>,
    #[arg(long)]
    pub host_id: Option<u64>,
    #[arg(long)]
    pub ip: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub auth_type: Option<String>,
    #[arg(long)]
    pub credential_id: Option<u64>,
}

impl AttachArgs {
    pub fn host_config(&self) -> TermResult<HostConfig> {
        let mut host = match &self.host_file {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|err| {
                    ErrorDetail::new(ErrorCode::IoError, "Failed to read host file")
                        .with_details(err.to_string())
                })?;
                serde_json::from_str::<HostConfig>(&content).map_err(|err| {
                    ErrorDetail::new(ErrorCode::InvalidArgument, "Failed to parse host file")
                        .with_details(err.to_string())
                })?
            }
            None => {
                let ip = self.ip.clone().ok_or_else(|| {
                    ErrorDetail::new(ErrorCode::InvalidArgument, "--ip or --host-file is required")
                })?;
                HostConfig::new(self.host_id.unwrap_or(0), ip, self.port.unwrap_or(22))
            }
        };

        if let Some(id) = self.host_id {
            host.id = id;
        }
        if let Some(ip) = &self.ip {
            host.ip = ip.clone();
        }
        if let Some(port) = self.port {
            host.port = port;
        }
        if let Some(username) = &self.username {
            host.username = Some(username.clone());
        }
        if let Some(auth_type) = &self.auth_type {
            host.auth_type = Some(auth_type.clone());
        }
        if let Some(credential_id) = self.credential_id {
            host.credential_id = Some(credential_id);
        }
        Ok(host)
    }
}

impl Config {
    pub fn load(args: &CommonArgs) -> TermResult<Self> {
        let mut config = if let Some(path) = &args.config {
            Self::from_file(path)?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        } else {
            Self::default()
        };

        config.apply_env();
        config.apply_cli(args);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> TermResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            ErrorDetail::new(ErrorCode::IoError, "Failed to read config file")
                .with_details(err.to_string())
        })?;
        let parsed: Self = toml::from_str(&content).map_err(|err| {
            ErrorDetail::new(ErrorCode::InvalidArgument, "Failed to parse config file")
                .with_details(err.to_string())
        })?;
        Ok(parsed)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("TERMWIRE_BROKER_URL")
            && !value.trim().is_empty()
        {
            self.broker.url = Some(value);
        }
        if let Ok(value) = env::var("TERMWIRE_ENVIRONMENT")
            && let Some(environment) = parse_environment(&value)
        {
            self.broker.environment = environment;
        }
        if let Ok(value) = env::var("TERMWIRE_PAGE_URL") {
            self.broker.page_url = value;
        }
        if let Ok(value) = env::var("TERMWIRE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("TERMWIRE_RIGHT_CLICK_PASTE")
            && let Some(enabled) = parse_bool(&value)
        {
            self.terminal.right_click_paste = enabled;
        }
    }

    fn apply_cli(&mut self, args: &CommonArgs) {
        if let Some(url) = &args.broker_url {
            self.broker.url = Some(url.clone());
        }
        if let Some(environment) = args.environment {
            self.broker.environment = environment;
        }
        if let Some(page_url) = &args.page_url {
            self.broker.page_url = page_url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }
}

fn parse_environment(value: &str) -> Option<Environment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Some(Environment::Development),
        "production" | "prod" => Some(Environment::Production),
        _ => None,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
