use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_edit::{value, DocumentMut};

use crate::rows::NumericPolicy;

pub const DEFAULT_URL: &str = "http://localhost:8000";
pub const DEFAULT_REFRESH_MS: u64 = 10_000;
pub const MIN_REFRESH_MS: u64 = 250;
pub const DEFAULT_TIMEOUT_SECS: u64 = 0;
pub const DEFAULT_ALLOW_HTTP: bool = true;
pub const DEFAULT_VIEW: &str = "live";
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_NUMERIC_POLICY: &str = "legacy";
pub const DEFAULT_SEQUENCE_GUARD: bool = false;
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";
pub const DEFAULT_SITE: &str = "Rosh Pina 28";
pub const DEFAULT_TITLE: &str = "Tel Aviv";
pub const DEFAULT_ERROR_MESSAGE: &str = "No connection to server";
pub const DEFAULT_CONFIG_FILE: &str = "flightboard.toml";
pub const DEFAULT_LOG_FILE: &str = "flightboard.log";

#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub refresh: Duration,
    pub timeout_secs: u64,
    pub insecure: bool,
    pub allow_http: bool,
    pub allow_insecure: bool,
    pub config_path: PathBuf,
    pub view: String,
    pub theme: String,
    pub numeric_policy: String,
    pub sequence_guard: bool,
    pub timezone: String,
    pub site: String,
    pub title: String,
    pub error_message: String,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            refresh: Duration::from_millis(DEFAULT_REFRESH_MS),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            insecure: false,
            allow_http: DEFAULT_ALLOW_HTTP,
            allow_insecure: false,
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            view: DEFAULT_VIEW.to_string(),
            theme: DEFAULT_THEME.to_string(),
            numeric_policy: DEFAULT_NUMERIC_POLICY.to_string(),
            sequence_guard: DEFAULT_SEQUENCE_GUARD,
            timezone: DEFAULT_TIMEZONE.to_string(),
            site: DEFAULT_SITE.to_string(),
            title: DEFAULT_TITLE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("Unknown timezone {}: {err}", self.timezone))
    }

    pub fn numeric_policy(&self) -> Result<NumericPolicy> {
        NumericPolicy::parse(&self.numeric_policy).ok_or_else(|| {
            anyhow!(
                "Unknown numeric policy {} (expected legacy, literal or absent)",
                self.numeric_policy
            )
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    url: Option<String>,
    refresh_ms: Option<u64>,
    timeout_secs: Option<u64>,
    insecure: Option<bool>,
    allow_http: Option<bool>,
    allow_insecure: Option<bool>,
    view: Option<String>,
    theme: Option<String>,
    numeric_policy: Option<String>,
    sequence_guard: Option<bool>,
    timezone: Option<String>,
    site: Option<String>,
    title: Option<String>,
    error_message: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_from(&args, |key| env::var(key).ok())
}

fn parse_from<F>(args: &[String], env_var: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env_var("FLIGHTBOARD_CONFIG").map(PathBuf::from);
    let config_path = explicit_config
        .clone()
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut config = Config {
        config_path: config_path.clone(),
        ..Config::default()
    };

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config);
        }
    } else if explicit_config.is_some() {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    apply_env(&mut config, &env_var);

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                iter.next();
            }
            "--url" => {
                config.url = iter
                    .next()
                    .ok_or_else(|| anyhow!("--url needs a value"))?
                    .to_string();
            }
            "--refresh-ms" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--refresh-ms needs a value"))?;
                let ms: u64 = value.parse()?;
                config.refresh = Duration::from_millis(ms.max(MIN_REFRESH_MS));
            }
            "--timeout" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--timeout needs a value"))?;
                config.timeout_secs = value.parse()?;
            }
            "--insecure" => {
                config.insecure = true;
            }
            "--allow-http" => {
                config.allow_http = true;
            }
            "--allow-insecure" => {
                config.allow_insecure = true;
            }
            "--view" => {
                config.view = iter
                    .next()
                    .ok_or_else(|| anyhow!("--view needs a value"))?
                    .to_string();
            }
            "--theme" => {
                config.theme = iter
                    .next()
                    .ok_or_else(|| anyhow!("--theme needs a value"))?
                    .to_string();
            }
            "--numeric-policy" => {
                config.numeric_policy = iter
                    .next()
                    .ok_or_else(|| anyhow!("--numeric-policy needs a value"))?
                    .to_string();
            }
            "--sequence-guard" => {
                config.sequence_guard = true;
            }
            "--no-sequence-guard" => {
                config.sequence_guard = false;
            }
            "--timezone" => {
                config.timezone = iter
                    .next()
                    .ok_or_else(|| anyhow!("--timezone needs a value"))?
                    .to_string();
            }
            "--site" => {
                config.site = iter
                    .next()
                    .ok_or_else(|| anyhow!("--site needs a value"))?
                    .to_string();
            }
            "--title" => {
                config.title = iter
                    .next()
                    .ok_or_else(|| anyhow!("--title needs a value"))?
                    .to_string();
            }
            "--error-message" => {
                config.error_message = iter
                    .next()
                    .ok_or_else(|| anyhow!("--error-message needs a value"))?
                    .to_string();
            }
            "--log" => {
                config.log_enabled = true;
            }
            "--no-log" => {
                config.log_enabled = false;
            }
            "--log-level" => {
                config.log_level = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-level needs a value"))?
                    .to_string();
            }
            "--log-file" => {
                config.log_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-file needs a value"))?
                    .to_string();
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    if config.error_message.trim().is_empty() {
        config.error_message = DEFAULT_ERROR_MESSAGE.to_string();
    }
    config.timezone()?;
    config.numeric_policy()?;
    validate_security(&config)?;
    Ok(config)
}

fn apply_env<F>(config: &mut Config, env_var: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let flag = |value: String| matches!(value.as_str(), "1" | "true" | "yes" | "on");

    if let Some(url) = env_var("FLIGHTBOARD_URL") {
        config.url = url;
    }
    if let Some(value) = env_var("FLIGHTBOARD_REFRESH_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.refresh = Duration::from_millis(ms.max(MIN_REFRESH_MS));
        }
    }
    if let Some(value) = env_var("FLIGHTBOARD_TIMEOUT") {
        if let Ok(secs) = value.parse::<u64>() {
            config.timeout_secs = secs;
        }
    }
    if let Some(value) = env_var("FLIGHTBOARD_INSECURE") {
        config.insecure = flag(value);
    }
    if let Some(value) = env_var("FLIGHTBOARD_ALLOW_HTTP") {
        config.allow_http = flag(value);
    }
    if let Some(value) = env_var("FLIGHTBOARD_ALLOW_INSECURE") {
        config.allow_insecure = flag(value);
    }
    if let Some(value) = env_var("FLIGHTBOARD_VIEW") {
        config.view = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_THEME") {
        config.theme = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_NUMERIC_POLICY") {
        config.numeric_policy = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_SEQUENCE_GUARD") {
        config.sequence_guard = flag(value);
    }
    if let Some(value) = env_var("FLIGHTBOARD_TIMEZONE") {
        config.timezone = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_SITE") {
        config.site = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_TITLE") {
        config.title = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_ERROR_MESSAGE") {
        config.error_message = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_LOG_ENABLED") {
        config.log_enabled = flag(value);
    }
    if let Some(value) = env_var("FLIGHTBOARD_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Some(value) = env_var("FLIGHTBOARD_LOG_FILE") {
        config.log_file = value;
    }
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) {
    if let Some(url) = file.url {
        target.url = url;
    }
    if let Some(refresh_ms) = file.refresh_ms {
        target.refresh = Duration::from_millis(refresh_ms.max(MIN_REFRESH_MS));
    }
    if let Some(timeout_secs) = file.timeout_secs {
        target.timeout_secs = timeout_secs;
    }
    if let Some(insecure) = file.insecure {
        target.insecure = insecure;
    }
    if let Some(allow_http) = file.allow_http {
        target.allow_http = allow_http;
    }
    if let Some(allow_insecure) = file.allow_insecure {
        target.allow_insecure = allow_insecure;
    }
    if let Some(view) = file.view {
        target.view = view;
    }
    if let Some(theme) = file.theme {
        target.theme = theme;
    }
    if let Some(numeric_policy) = file.numeric_policy {
        target.numeric_policy = numeric_policy;
    }
    if let Some(sequence_guard) = file.sequence_guard {
        target.sequence_guard = sequence_guard;
    }
    if let Some(timezone) = file.timezone {
        target.timezone = timezone;
    }
    if let Some(site) = file.site {
        target.site = site;
    }
    if let Some(title) = file.title {
        target.title = title;
    }
    if let Some(error_message) = file.error_message {
        target.error_message = error_message;
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
}

/// Writes one top-level string key back to the config file, keeping the
/// rest of the document as the user wrote it.
pub fn save_setting(path: &Path, key: &str, new_value: &str) -> Result<()> {
    let content = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?
    } else {
        String::new()
    };
    let mut doc = content
        .parse::<DocumentMut>()
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    doc[key] = value(new_value);
    fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

fn print_help() {
    println!("flightboard");
    println!("Usage: flightboard [--url URL] [--refresh-ms MS] [--timeout SECS] [--config PATH]");
    println!("       [--insecure] [--allow-http] [--allow-insecure]");
    println!("       [--view live|history] [--theme default|amber|mono]");
    println!("       [--numeric-policy legacy|literal|absent]");
    println!("       [--sequence-guard] [--no-sequence-guard]");
    println!("       [--timezone TZ] [--site NAME] [--title TEXT] [--error-message TEXT]");
    println!("       [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("Environment: FLIGHTBOARD_URL overrides the API base URL");
    println!("Environment: FLIGHTBOARD_CONFIG overrides config path");
    println!("Environment: FLIGHTBOARD_REFRESH_MS sets the live poll interval");
    println!("Environment: FLIGHTBOARD_TIMEOUT sets the request timeout (0 = none)");
    println!("Environment: FLIGHTBOARD_INSECURE=1 enables invalid TLS certs");
    println!("Environment: FLIGHTBOARD_ALLOW_HTTP/ALLOW_INSECURE relax URL checks");
    println!("Environment: FLIGHTBOARD_VIEW FLIGHTBOARD_THEME select start view and theme");
    println!("Environment: FLIGHTBOARD_NUMERIC_POLICY FLIGHTBOARD_SEQUENCE_GUARD tune rendering");
    println!("Environment: FLIGHTBOARD_TIMEZONE FLIGHTBOARD_SITE FLIGHTBOARD_TITLE FLIGHTBOARD_ERROR_MESSAGE");
    println!("Environment: FLIGHTBOARD_LOG_ENABLED/LEVEL/FILE configure logging");
    println!("Keys: q quit | 1 live | 2 history | Tab switch | up/down move | Enter detail");
    println!("      r reload | i server status | t theme | ? help");
}

fn validate_security(config: &Config) -> Result<()> {
    let trimmed = config.url.trim();
    if trimmed.to_ascii_lowercase().starts_with("http://") && !config.allow_http {
        return Err(anyhow!(
            "Refusing insecure http URL (set allow_http=true or FLIGHTBOARD_ALLOW_HTTP=1 to override)"
        ));
    }
    if config.insecure && !config.allow_insecure {
        return Err(anyhow!(
            "Refusing --insecure without explicit allow_insecure=true or FLIGHTBOARD_ALLOW_INSECURE=1"
        ));
    }
    Ok(())
}
