use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the relay bridge.
///
/// Everything comes from the environment, with an optional `.env` file
/// honored for local runs.
#[derive(Clone, Debug)]
pub struct Config {
    // Platform session
    pub telegram_bot_token: String,

    // Media cache
    pub media_dir: PathBuf,
    pub media_retention: Duration,
    pub sweep_interval: Duration,

    // HTTP surfaces
    pub bind_host: String,
    pub public_media_host: String,
    pub public_media_port: u16,
    pub api_port: u16,

    // Outbound webhook
    pub webhook_url: Option<String>,
    pub webhook_api_key: Option<String>,
    pub webhook_timeout: Duration,

    // Control API shared secret
    pub api_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let media_dir =
            PathBuf::from(env_str("MEDIA_DIR").unwrap_or_else(|| "userbot_media".to_string()));
        // The media directory is the one path the process must be able to
        // write; an unwritable location is fatal at startup.
        fs::create_dir_all(&media_dir)?;

        let media_retention =
            Duration::from_secs(env_u64("MEDIA_RETENTION_HOURS").unwrap_or(72) * 3600);
        let sweep_interval =
            Duration::from_secs(env_u64("MEDIA_SWEEP_INTERVAL_SECS").unwrap_or(3600));

        let bind_host = env_str("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let public_media_host =
            env_str("PUBLIC_MEDIA_HOST").unwrap_or_else(|| "localhost".to_string());
        let public_media_port = env_u16("PUBLIC_MEDIA_PORT").unwrap_or(8181);
        let api_port = env_u16("API_PORT").unwrap_or(8001);

        let webhook_url = env_str("WEBHOOK_URL").and_then(non_empty);
        let webhook_api_key = env_str("WEBHOOK_API_KEY").and_then(non_empty);
        let webhook_timeout =
            Duration::from_millis(env_u64("WEBHOOK_TIMEOUT_MS").unwrap_or(5000));

        let api_token = env_str("X_API_TOKEN").and_then(non_empty);

        Ok(Self {
            telegram_bot_token,
            media_dir,
            media_retention,
            sweep_interval,
            bind_host,
            public_media_host,
            public_media_port,
            api_port,
            webhook_url,
            webhook_api_key,
            webhook_timeout,
            api_token,
        })
    }

    /// Base URL webhook consumers use to fetch stored media.
    pub fn public_media_base(&self) -> String {
        format!("http://{}:{}", self.public_media_host, self.public_media_port)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_filters_blank_values() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }

    #[test]
    fn public_media_base_joins_host_and_port() {
        let cfg = Config {
            telegram_bot_token: "t".to_string(),
            media_dir: PathBuf::from("/tmp"),
            media_retention: Duration::from_secs(72 * 3600),
            sweep_interval: Duration::from_secs(3600),
            bind_host: "0.0.0.0".to_string(),
            public_media_host: "media.example.com".to_string(),
            public_media_port: 8181,
            api_port: 8001,
            webhook_url: None,
            webhook_api_key: None,
            webhook_timeout: Duration::from_secs(5),
            api_token: None,
        };
        assert_eq!(cfg.public_media_base(), "http://media.example.com:8181");
    }
}
