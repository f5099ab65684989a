use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, fs};

use error_stack::{IntoReport, Report, ResultExt};

use crate::Suggestion;

#[derive(Debug)]
pub struct ConfigError;

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Config error")
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = error_stack::Result<T, ConfigError>;

/// `AppConfig` holds everything a sync run needs. It is built once at startup
/// and handed to the constructors of the catalog, sync and player components.
#[derive(Clone)]
pub struct AppConfig {
    pub token: String,
    pub api_base_url: String,
    pub music_dir: PathBuf,
    pub mpd_host: String,
    pub mpd_port: u16,
    /// Name of the sync folder relative to MPD's `music_directory`.
    pub mpd_subdirectory: String,
    pub rescan_grace: Duration,
}

impl AppConfig {
    pub const API_BASE_URL: &'static str = "https://api.music.yandex.net";
    /// Client id the catalog API expects in `X-Yandex-Music-Client`.
    pub const CLIENT_ID: &'static str = "WindowsPhone/3.20";
    pub const TOKEN_PLACEHOLDER: &'static str = "YOUR_TOKEN_HERE";
    pub const DEFAULT_MUSIC_DIR: &'static str = "~/Music/yandex-music";
    pub const DEFAULT_MPD_HOST: &'static str = "localhost";
    pub const DEFAULT_MPD_PORT: u16 = 6600;
    pub const DEFAULT_RESCAN_GRACE_SECS: u64 = 2;

    /// Reads the configuration from the environment, after loading `.env` if present.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("YAMUSIC_TOKEN").unwrap_or_default();
        Self::validate_token(&token)?;

        let music_dir = expand_path(
            &lookup("YAMUSIC_DIR").unwrap_or_else(|| Self::DEFAULT_MUSIC_DIR.to_string()),
        );
        let mpd_subdirectory = match lookup("YAMUSIC_MPD_SUBDIR") {
            Some(subdirectory) => subdirectory.trim_matches('/').to_string(),
            None => music_dir
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let mpd_port = match lookup("MPD_PORT") {
            Some(port) => port
                .parse::<u16>()
                .into_report()
                .attach_printable(format!("MPD_PORT is not a valid port: {}", port))
                .change_context(ConfigError)?,
            None => Self::DEFAULT_MPD_PORT,
        };
        let rescan_grace_secs = match lookup("YAMUSIC_RESCAN_GRACE_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .into_report()
                .attach_printable(format!(
                    "YAMUSIC_RESCAN_GRACE_SECS is not a number of seconds: {}",
                    secs
                ))
                .change_context(ConfigError)?,
            None => Self::DEFAULT_RESCAN_GRACE_SECS,
        };

        Ok(Self {
            token,
            api_base_url: lookup("YAMUSIC_API_URL")
                .unwrap_or_else(|| Self::API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            music_dir,
            mpd_host: lookup("MPD_HOST").unwrap_or_else(|| Self::DEFAULT_MPD_HOST.to_string()),
            mpd_port,
            mpd_subdirectory,
            rescan_grace: Duration::from_secs(rescan_grace_secs),
        })
    }

    fn validate_token(token: &str) -> ConfigResult<()> {
        if token.trim().is_empty() || token == Self::TOKEN_PLACEHOLDER {
            return Err(Report::new(ConfigError)
                .attach_printable("OAuth token is missing")
                .attach(Suggestion(
                    "set the YAMUSIC_TOKEN environment variable (or add it to a .env file)"
                        .to_string(),
                )));
        }
        Ok(())
    }

    /// Creates the sync directory if it does not exist yet.
    pub fn ensure_music_dir(&self) -> ConfigResult<&Path> {
        fs::create_dir_all(&self.music_dir)
            .into_report()
            .attach_printable(format!(
                "Failed to create music directory at {}",
                self.music_dir.display()
            ))
            .change_context(ConfigError)?;
        Ok(&self.music_dir)
    }

    pub fn mpd_address(&self) -> String {
        format!("{}:{}", self.mpd_host, self.mpd_port)
    }

    fn masked_token(&self) -> String {
        let visible = self.token.chars().take(4).collect::<String>();
        format!("{}***", visible)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("token", &self.masked_token())
            .field("api_base_url", &self.api_base_url)
            .field("music_dir", &self.music_dir)
            .field("mpd_host", &self.mpd_host)
            .field("mpd_port", &self.mpd_port)
            .field("mpd_subdirectory", &self.mpd_subdirectory)
            .field("rescan_grace", &self.rescan_grace)
            .finish()
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_placeholder_token_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("YAMUSIC_TOKEN", "YOUR_TOKEN_HERE")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("YAMUSIC_TOKEN", "AQAAAAAtoken"),
            ("YAMUSIC_DIR", "/srv/music/yandex-music"),
        ]))
        .unwrap();
        assert_eq!(config.music_dir, PathBuf::from("/srv/music/yandex-music"));
        assert_eq!(config.mpd_subdirectory, "yandex-music");
        assert_eq!(config.mpd_address(), "localhost:6600");
        assert_eq!(config.api_base_url, AppConfig::API_BASE_URL);
        assert_eq!(config.rescan_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("YAMUSIC_TOKEN", "AQAAAAAtoken"),
            ("YAMUSIC_DIR", "/srv/music/likes"),
            ("YAMUSIC_MPD_SUBDIR", "/yandex/likes/"),
            ("YAMUSIC_API_URL", "http://127.0.0.1:8080/"),
            ("MPD_HOST", "mpd.lan"),
            ("MPD_PORT", "6601"),
            ("YAMUSIC_RESCAN_GRACE_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.mpd_subdirectory, "yandex/likes");
        assert_eq!(config.api_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.mpd_address(), "mpd.lan:6601");
        assert_eq!(config.rescan_grace, Duration::ZERO);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("YAMUSIC_TOKEN", "AQAAAAAtoken"),
            ("MPD_PORT", "sixty-six"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_masks_token() {
        let config = AppConfig::from_lookup(lookup_from(&[(
            "YAMUSIC_TOKEN",
            "AQAAAAAsecret-token-value",
        )]))
        .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-token-value"));
        assert!(printed.contains("AQAA***"));
    }

    #[test]
    fn test_ensure_music_dir_creates_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("yandex-music");
        let config = AppConfig::from_lookup(lookup_from(&[
            ("YAMUSIC_TOKEN", "AQAAAAAtoken"),
            ("YAMUSIC_DIR", dir.to_str().unwrap()),
        ]))
        .unwrap();
        config.ensure_music_dir().unwrap();
        assert!(dir.is_dir());
    }
}
