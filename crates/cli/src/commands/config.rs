use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use shipbot_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "twitter.account_id",
            value: config.twitter.account_id.clone(),
            env_keys: &["SHIPBOT_TWITTER_ACCOUNT_ID", "TWITTER_ACCOUNT_ID"],
        },
        Field {
            key: "twitter.bearer_token",
            value: redact_secret(&config.twitter.bearer_token),
            env_keys: &["SHIPBOT_TWITTER_BEARER_TOKEN", "TWITTER_BEARER_TOKEN"],
        },
        Field {
            key: "twitter.access_token",
            value: redact_secret(&config.twitter.access_token),
            env_keys: &["SHIPBOT_TWITTER_ACCESS_TOKEN", "TWITTER_ACCESS_TOKEN"],
        },
        Field {
            key: "twitter.api_base_url",
            value: config.twitter.api_base_url.clone(),
            env_keys: &["SHIPBOT_TWITTER_API_BASE_URL"],
        },
        Field {
            key: "yelp.api_key",
            value: redact_secret(&config.yelp.api_key),
            env_keys: &["SHIPBOT_YELP_API_KEY", "YELP_API_KEY"],
        },
        Field {
            key: "yelp.base_url",
            value: config.yelp.base_url.clone(),
            env_keys: &["SHIPBOT_YELP_BASE_URL"],
        },
        Field {
            key: "shipengine.api_key",
            value: redact_secret(&config.shipengine.api_key),
            env_keys: &["SHIPBOT_SHIPENGINE_API_KEY", "SHIP_ENGINE_API_KEY"],
        },
        Field {
            key: "shipengine.base_url",
            value: config.shipengine.base_url.clone(),
            env_keys: &["SHIPBOT_SHIPENGINE_BASE_URL"],
        },
        Field {
            key: "http.timeout_secs",
            value: config.http.timeout_secs.to_string(),
            env_keys: &["SHIPBOT_HTTP_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["SHIPBOT_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["SHIPBOT_SERVER_PORT", "PORT"],
        },
        Field {
            key: "server.redirect_url",
            value: config.server.redirect_url.clone(),
            env_keys: &["SHIPBOT_SERVER_REDIRECT_URL"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SHIPBOT_LOGGING_LEVEL", "SHIPBOT_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: config.logging.format.as_str().to_string(),
            env_keys: &["SHIPBOT_LOGGING_FORMAT", "SHIPBOT_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shipbot.toml"), PathBuf::from("config/shipbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    redact_token(secret.expose_secret())
}

/// Keeps a ShipEngine-style `TEST_` sandbox prefix visible; everything else is hidden.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        let sandbox_prefix = !prefix.is_empty()
            && prefix.len() <= 8
            && prefix.chars().all(|ch| ch.is_ascii_uppercase());
        if sandbox_prefix {
            return format!("{prefix}_***");
        }
    }

    "<redacted>".to_string()
}
