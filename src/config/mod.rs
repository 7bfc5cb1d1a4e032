//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Parser, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::DiagramFormat;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "plantd";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_JAVA_PATH: &str = "java";
const DEFAULT_JAR_DIR: &str = "jars";
const DEFAULT_JAR_NAME: &str = "plantuml-1.2024.6.jar";
const DEFAULT_TEMP_DIR: &str = "temp";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RENDER_MAX_CONCURRENCY: u32 = 4;

/// Command-line arguments for the plantd binary.
#[derive(Debug, Parser, Default)]
#[command(name = "plantd", version, about = "PlantUML render gateway")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PLANTD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the Java executable used to run the renderer.
    #[arg(long = "renderer-java-path", value_name = "PATH")]
    pub renderer_java_path: Option<PathBuf>,

    /// Override the directory holding the renderer jar and plugin jars.
    #[arg(long = "renderer-jar-dir", value_name = "PATH")]
    pub renderer_jar_dir: Option<PathBuf>,

    /// Override the renderer jar file name within the jar directory.
    #[arg(long = "renderer-jar-name", value_name = "NAME")]
    pub renderer_jar_name: Option<String>,

    /// Override the ephemeral workspace directory.
    #[arg(long = "renderer-temp-dir", value_name = "PATH")]
    pub renderer_temp_dir: Option<PathBuf>,

    /// Override the format used when a request does not name one.
    #[arg(long = "renderer-default-format", value_name = "FORMAT")]
    pub renderer_default_format: Option<String>,

    /// Override the response contract (two_phase|inline).
    #[arg(long = "renderer-response-mode", value_name = "MODE")]
    pub renderer_response_mode: Option<String>,

    /// Override the maximum number of concurrent renderer subprocesses.
    #[arg(long = "renderer-max-concurrency", value_name = "COUNT")]
    pub renderer_max_concurrency: Option<u32>,

    /// Override the per-invocation wall-clock timeout.
    #[arg(long = "renderer-timeout-seconds", value_name = "SECONDS")]
    pub renderer_timeout_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub renderer: RendererSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// How `/generate` answers: an id for later retrieval, or the artifact itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    TwoPhase,
    Inline,
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub java_path: PathBuf,
    pub jar_dir: PathBuf,
    pub jar_name: String,
    pub temp_dir: PathBuf,
    pub default_format: DiagramFormat,
    pub response_mode: ResponseMode,
    pub max_concurrency: NonZeroU32,
    pub timeout: Duration,
}

impl RendererSettings {
    /// Absolute-or-relative path of the core renderer jar.
    pub fn jar_path(&self) -> PathBuf {
        self.jar_dir.join(&self.jar_name)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PLANTD").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli_overrides(cli);

    Settings::from_raw(raw)
}

/// Parse the process arguments and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    renderer: RawRendererSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    java_path: Option<PathBuf>,
    jar_dir: Option<PathBuf>,
    jar_name: Option<String>,
    temp_dir: Option<PathBuf>,
    default_format: Option<String>,
    response_mode: Option<String>,
    max_concurrency: Option<u32>,
    timeout_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(host) = cli.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = cli.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = cli.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = cli.renderer_java_path.as_ref() {
            self.renderer.java_path = Some(path.clone());
        }
        if let Some(dir) = cli.renderer_jar_dir.as_ref() {
            self.renderer.jar_dir = Some(dir.clone());
        }
        if let Some(name) = cli.renderer_jar_name.as_ref() {
            self.renderer.jar_name = Some(name.clone());
        }
        if let Some(dir) = cli.renderer_temp_dir.as_ref() {
            self.renderer.temp_dir = Some(dir.clone());
        }
        if let Some(format) = cli.renderer_default_format.as_ref() {
            self.renderer.default_format = Some(format.clone());
        }
        if let Some(mode) = cli.renderer_response_mode.as_ref() {
            self.renderer.response_mode = Some(mode.clone());
        }
        if let Some(count) = cli.renderer_max_concurrency {
            self.renderer.max_concurrency = Some(count);
        }
        if let Some(seconds) = cli.renderer_timeout_seconds {
            self.renderer.timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            renderer,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            renderer: build_renderer_settings(renderer)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let ip = IpAddr::from_str(&host)
        .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;

    Ok(ServerSettings {
        addr: SocketAddr::new(ip, port),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(value) => LevelFilter::from_str(&value)
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_renderer_settings(renderer: RawRendererSettings) -> Result<RendererSettings, LoadError> {
    let java_path = renderer
        .java_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_JAVA_PATH));
    let jar_dir = renderer
        .jar_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_JAR_DIR));
    let jar_name = renderer
        .jar_name
        .unwrap_or_else(|| DEFAULT_JAR_NAME.to_string());
    let temp_dir = renderer
        .temp_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR));

    let default_format = match renderer.default_format {
        Some(value) => value
            .parse::<DiagramFormat>()
            .map_err(|err| LoadError::invalid("renderer.default_format", err.to_string()))?,
        None => DiagramFormat::Svg,
    };

    let response_mode = match renderer.response_mode.as_deref() {
        None | Some("two_phase") => ResponseMode::TwoPhase,
        Some("inline") => ResponseMode::Inline,
        Some(other) => {
            return Err(LoadError::invalid(
                "renderer.response_mode",
                format!("expected `two_phase` or `inline`, got `{other}`"),
            ));
        }
    };

    let max_concurrency = renderer
        .max_concurrency
        .unwrap_or(DEFAULT_RENDER_MAX_CONCURRENCY);
    let max_concurrency = NonZeroU32::new(max_concurrency).ok_or_else(|| {
        LoadError::invalid(
            "renderer.max_concurrency",
            "concurrency cap must be greater than zero",
        )
    })?;

    let timeout_seconds = renderer
        .timeout_seconds
        .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "renderer.timeout_seconds",
            "timeout must be greater than zero",
        ));
    }

    Ok(RendererSettings {
        java_path,
        jar_dir,
        jar_name,
        temp_dir,
        default_format,
        response_mode,
        max_concurrency,
        timeout: Duration::from_secs(timeout_seconds),
    })
}
