//! Configuration management for plateshot.
//!
//! Configuration is loaded with figment from defaults, a TOML file and
//! environment variables. The recognition endpoint saved through
//! `plateshot settings` lives in the database, not here; `api.endpoint` is
//! only the fallback used when no endpoint has been saved.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "plateshot";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "plates.db";

/// Directory (under the data dir) holding archived JPEGs.
const IMAGES_DIR_NAME: &str = "images";

/// Environment variable prefix. Nested keys use a double underscore,
/// e.g. `PLATESHOT_API__ENDPOINT`.
const ENV_PREFIX: &str = "PLATESHOT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PLATESHOT_`)
/// 2. TOML config file at `~/.config/plateshot/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition API configuration.
    pub api: ApiConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Capture configuration.
    pub capture: CaptureConfig,
}

/// Which flavour of the recognition API to talk to.
///
/// The two variants expose different paths for the same feature, and only
/// the mobile one has a sync endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVariant {
    /// `POST <base>/api/process-plate`
    #[default]
    Web,
    /// `POST <base>/numberplates/analyze`, plus `POST <base>/numberplates` for sync
    Mobile,
}

impl std::fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// Recognition API configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Fallback endpoint base URL, used when none has been saved in settings.
    pub endpoint: Option<String>,
    /// API flavour.
    pub variant: ApiVariant,
    /// Per-request timeout in seconds. 0 means no timeout.
    pub timeout_secs: u64,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/plateshot/plates.db`
    pub database_path: Option<PathBuf>,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long to wait for a frame source before giving up.
    pub acquire_timeout_ms: u64,
    /// Longest edge of the submitted JPEG in pixels. 0 disables downscaling.
    pub max_dimension: u32,
    /// JPEG encoder quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 10_000,
            max_dimension: 1600,
            jpeg_quality: 85,
        }
    }
}

impl Config {
    /// Load configuration from all sources, reading `config_path` instead of
    /// the default file when given.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capture.acquire_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "acquire_timeout_ms must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "jpeg_quality must be between 1 and 100, got {}",
                    self.capture.jpeg_quality
                ),
            });
        }

        if let Some(endpoint) = &self.api.endpoint {
            if let Err(e) = crate::settings::parse_endpoint(endpoint) {
                return Err(Error::ConfigValidation {
                    message: format!("api.endpoint: {e}"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Directory for archived images, next to the database.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.database_path()
            .parent()
            .map_or_else(Self::default_data_dir, std::path::Path::to_path_buf)
            .join(IMAGES_DIR_NAME)
    }

    /// Get the acquisition timeout as a Duration.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.acquire_timeout_ms)
    }

    /// Get the request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.api.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.api.timeout_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.api.endpoint.is_none());
        assert_eq!(config.api.variant, ApiVariant::Web);
        assert_eq!(config.api.timeout_secs, 0);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_default_capture_config() {
        let capture = CaptureConfig::default();

        assert_eq!(capture.acquire_timeout_ms, 10_000);
        assert_eq!(capture.max_dimension, 1600);
        assert_eq!(capture.jpeg_quality, 85);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_acquire_timeout() {
        let mut config = Config::default();
        config.capture.acquire_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("acquire_timeout_ms"));
    }

    #[test]
    fn test_validate_jpeg_quality_range() {
        let mut config = Config::default();
        config.capture.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.capture.jpeg_quality = 101;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("jpeg_quality"));

        config.capture.jpeg_quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_endpoint() {
        let mut config = Config::default();
        config.api.endpoint = Some("not a url".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api.endpoint"));
    }

    #[test]
    fn test_validate_good_endpoint() {
        let mut config = Config::default();
        config.api.endpoint = Some("https://plates.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("plates.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.images_dir(), PathBuf::from("/custom/path/images"));
    }

    #[test]
    fn test_acquire_timeout() {
        assert_eq!(
            Config::default().acquire_timeout(),
            Duration::from_millis(10_000)
        );
    }

    #[test]
    fn test_request_timeout() {
        let mut config = Config::default();
        assert!(config.request_timeout().is_none());

        config.api.timeout_secs = 30;
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_api_variant_serde() {
        let variant: ApiVariant = serde_json::from_str("\"mobile\"").unwrap();
        assert_eq!(variant, ApiVariant::Mobile);
        assert_eq!(serde_json::to_string(&ApiVariant::Web).unwrap(), "\"web\"");
        assert_eq!(ApiVariant::Mobile.to_string(), "mobile");
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("plateshot"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
endpoint = "http://localhost:3000"
variant = "mobile"

[capture]
jpeg_quality = 70
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(
            config.api.endpoint.as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(config.api.variant, ApiVariant::Mobile);
        assert_eq!(config.capture.jpeg_quality, 70);
        assert_eq!(config.capture.max_dimension, 1600);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\njpeg_quality = 0\n").unwrap();

        let result = Config::load_from(Some(path));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_capture_config_deserialize_partial() {
        let json = r#"{"max_dimension": 800}"#;
        let capture: CaptureConfig = serde_json::from_str(json).unwrap();
        assert_eq!(capture.max_dimension, 800);
        assert_eq!(capture.acquire_timeout_ms, 10_000);
    }
}
