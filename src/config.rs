use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub config_path: PathBuf,
    pub token_override: Option<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        let api_base_url = env::var("BEEPER_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let config_dir = env::var("BEEP_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_dir());
        let config_path = env::var("BEEP_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("config.json"));

        let token_override = env::var("BEEPER_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let request_timeout = env::var("BEEP_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self {
            api_base_url,
            config_path,
            token_override,
            request_timeout,
        }
    }
}

const DEFAULT_API_BASE_URL: &str = "http://localhost:23373";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_config_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return PathBuf::from(xdg).join("beep");
        }
    }
    let base = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    base.join(".config").join("beep")
}
