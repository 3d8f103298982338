use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub twitter: TwitterConfig,
    pub yelp: YelpConfig,
    pub shipengine: ShipEngineConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TwitterConfig {
    /// Mentions authored by this account are never answered.
    pub account_id: String,
    pub bearer_token: SecretString,
    pub access_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct YelpConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct ShipEngineConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub redirect_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub twitter_account_id: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub twitter_access_token: Option<String>,
    pub twitter_api_base_url: Option<String>,
    pub yelp_api_key: Option<String>,
    pub yelp_base_url: Option<String>,
    pub shipengine_api_key: Option<String>,
    pub shipengine_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twitter: TwitterConfig {
                account_id: String::new(),
                bearer_token: String::new().into(),
                access_token: String::new().into(),
                api_base_url: "https://api.twitter.com".to_string(),
            },
            yelp: YelpConfig {
                api_key: String::new().into(),
                base_url: "https://api.yelp.com".to_string(),
            },
            shipengine: ShipEngineConfig {
                api_key: String::new().into(),
                base_url: "https://api.shipengine.com".to_string(),
            },
            http: HttpConfig { timeout_secs: 30 },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                redirect_url: "http://bigstickcarpet.com/ship-engine-bot/".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shipbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(twitter) = patch.twitter {
            if let Some(account_id) = twitter.account_id {
                self.twitter.account_id = account_id;
            }
            if let Some(bearer_token) = twitter.bearer_token {
                self.twitter.bearer_token = secret_value(bearer_token);
            }
            if let Some(access_token) = twitter.access_token {
                self.twitter.access_token = secret_value(access_token);
            }
            if let Some(api_base_url) = twitter.api_base_url {
                self.twitter.api_base_url = api_base_url;
            }
        }

        if let Some(yelp) = patch.yelp {
            if let Some(api_key) = yelp.api_key {
                self.yelp.api_key = secret_value(api_key);
            }
            if let Some(base_url) = yelp.base_url {
                self.yelp.base_url = base_url;
            }
        }

        if let Some(shipengine) = patch.shipengine {
            if let Some(api_key) = shipengine.api_key {
                self.shipengine.api_key = secret_value(api_key);
            }
            if let Some(base_url) = shipengine.base_url {
                self.shipengine.base_url = base_url;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(redirect_url) = server.redirect_url {
                self.server.redirect_url = redirect_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Unprefixed names are the ones the hosted bot has always been deployed with.
        if let Some(value) =
            read_env("SHIPBOT_TWITTER_ACCOUNT_ID").or_else(|| read_env("TWITTER_ACCOUNT_ID"))
        {
            self.twitter.account_id = value;
        }
        if let Some(value) =
            read_env("SHIPBOT_TWITTER_BEARER_TOKEN").or_else(|| read_env("TWITTER_BEARER_TOKEN"))
        {
            self.twitter.bearer_token = secret_value(value);
        }
        if let Some(value) =
            read_env("SHIPBOT_TWITTER_ACCESS_TOKEN").or_else(|| read_env("TWITTER_ACCESS_TOKEN"))
        {
            self.twitter.access_token = secret_value(value);
        }
        if let Some(value) = read_env("SHIPBOT_TWITTER_API_BASE_URL") {
            self.twitter.api_base_url = value;
        }

        if let Some(value) = read_env("SHIPBOT_YELP_API_KEY").or_else(|| read_env("YELP_API_KEY")) {
            self.yelp.api_key = secret_value(value);
        }
        if let Some(value) = read_env("SHIPBOT_YELP_BASE_URL") {
            self.yelp.base_url = value;
        }

        if let Some(value) =
            read_env("SHIPBOT_SHIPENGINE_API_KEY").or_else(|| read_env("SHIP_ENGINE_API_KEY"))
        {
            self.shipengine.api_key = secret_value(value);
        }
        if let Some(value) = read_env("SHIPBOT_SHIPENGINE_BASE_URL") {
            self.shipengine.base_url = value;
        }

        if let Some(value) = read_env("SHIPBOT_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_u64("SHIPBOT_HTTP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHIPBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHIPBOT_SERVER_PORT") {
            self.server.port = parse_u16("SHIPBOT_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("SHIPBOT_SERVER_REDIRECT_URL") {
            self.server.redirect_url = value;
        }

        let log_level =
            read_env("SHIPBOT_LOGGING_LEVEL").or_else(|| read_env("SHIPBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHIPBOT_LOGGING_FORMAT").or_else(|| read_env("SHIPBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(account_id) = overrides.twitter_account_id {
            self.twitter.account_id = account_id;
        }
        if let Some(bearer_token) = overrides.twitter_bearer_token {
            self.twitter.bearer_token = secret_value(bearer_token);
        }
        if let Some(access_token) = overrides.twitter_access_token {
            self.twitter.access_token = secret_value(access_token);
        }
        if let Some(api_base_url) = overrides.twitter_api_base_url {
            self.twitter.api_base_url = api_base_url;
        }
        if let Some(api_key) = overrides.yelp_api_key {
            self.yelp.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.yelp_base_url {
            self.yelp.base_url = base_url;
        }
        if let Some(api_key) = overrides.shipengine_api_key {
            self.shipengine.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.shipengine_base_url {
            self.shipengine.base_url = base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_twitter(&self.twitter)?;
        validate_api_key("yelp.api_key", &self.yelp.api_key)?;
        validate_http_url("yelp.base_url", &self.yelp.base_url)?;
        validate_api_key("shipengine.api_key", &self.shipengine.api_key)?;
        validate_http_url("shipengine.base_url", &self.shipengine.base_url)?;
        validate_http(&self.http)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shipbot.toml"), PathBuf::from("config/shipbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_twitter(twitter: &TwitterConfig) -> Result<(), ConfigError> {
    let account_id = twitter.account_id.trim();
    if account_id.is_empty() {
        return Err(ConfigError::Validation(
            "twitter.account_id is required so the bot can ignore its own posts".to_string(),
        ));
    }
    if !account_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "twitter.account_id must be the numeric user id, not the @handle".to_string(),
        ));
    }

    if twitter.bearer_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "twitter.bearer_token is required to open the mention stream".to_string(),
        ));
    }
    if twitter.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "twitter.access_token is required to post replies".to_string(),
        ));
    }

    validate_http_url("twitter.api_base_url", &twitter.api_base_url)
}

fn validate_api_key(key: &str, value: &SecretString) -> Result<(), ConfigError> {
    if value.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    validate_http_url("server.redirect_url", &server.redirect_url)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    twitter: Option<TwitterPatch>,
    yelp: Option<ApiPatch>,
    shipengine: Option<ApiPatch>,
    http: Option<HttpPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TwitterPatch {
    account_id: Option<String>,
    bearer_token: Option<String>,
    access_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPatch {
    api_key: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    redirect_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
