use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// File name of the persisted license record inside the data directory.
pub const STATE_FILE_NAME: &str = "license.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the licensing backend, without trailing slash
    pub api_url: String,
    /// Where the license record is persisted (None = platform data dir)
    pub state_path: Option<PathBuf>,
    /// HTTP client timeout (None = wait indefinitely)
    pub http_timeout: Option<Duration>,
    /// Dev backend bind host
    pub host: String,
    /// Dev backend bind port
    pub port: u16,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("NERO_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let api_url = env::var("NERO_API_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/api", host, port));

        let http_timeout = env::var("NERO_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            api_url: normalize_base_url(&api_url),
            state_path: env::var("NERO_STATE_PATH").ok().map(PathBuf::from),
            http_timeout,
            host,
            port,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves the state file path, falling back to the platform data dir:
    /// - Linux: `~/.local/share/nero/license.json`
    /// - macOS: `~/Library/Application Support/nero/license.json`
    /// - Windows: `C:\Users\{User}\AppData\Roaming\nero\data\license.json`
    pub fn resolve_state_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.state_path {
            return Some(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "nero")?;
        Some(dirs.data_dir().join(STATE_FILE_NAME))
    }
}

/// Strips trailing slashes so paths can be appended with `format!`.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_removed() {
        assert_eq!(
            normalize_base_url("https://licensing.example.com/api//"),
            "https://licensing.example.com/api"
        );
        assert_eq!(normalize_base_url("http://h:1"), "http://h:1");
    }

    #[test]
    fn explicit_state_path_wins() {
        let config = Config {
            api_url: "http://localhost".into(),
            state_path: Some(PathBuf::from("/tmp/nero-state.json")),
            http_timeout: None,
            host: "127.0.0.1".into(),
            port: 3000,
            dev_mode: false,
        };
        assert_eq!(
            config.resolve_state_path(),
            Some(PathBuf::from("/tmp/nero-state.json"))
        );
        assert_eq!(config.addr(), "127.0.0.1:3000");
    }
}
