//! Configuration for citifix
//!
//! Stored in <data dir>/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "CITIFIX_DATA_DIR";
pub const PORT_ENV: &str = "CITIFIX_API_PORT";

/// citifix configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Distance settings
    pub geo: GeoConfig,

    /// Gamification and lifecycle rules
    pub rules: RulesConfig,

    /// Page sizes for listings
    pub pagination: PaginationConfig,

    /// Upload limits
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3848,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Default radius for "nearby" listings, in km
    pub nearby_radius_km: f64,

    /// Radius under which a same-category open issue counts as duplicate, in km
    pub duplicate_radius_km: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            nearby_radius_km: 5.0,
            duplicate_radius_km: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Votes needed to move a reported issue to verified
    pub auto_verify_threshold: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            auto_verify_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: usize,
    pub max_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: 15,
            max_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Maximum size of a single upload in bytes
    pub max_file_size: u64,

    /// Maximum number of files per upload batch
    pub max_files: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::Result<()> {
        if self.geo.duplicate_radius_km <= 0.0 || self.geo.nearby_radius_km <= 0.0 {
            return Err(crate::Error::Config("radii must be positive".into()));
        }
        if self.rules.auto_verify_threshold == 0 {
            return Err(crate::Error::Config(
                "auto_verify_threshold must be at least 1".into(),
            ));
        }
        if self.pagination.default_per_page == 0
            || self.pagination.default_per_page > self.pagination.max_per_page
        {
            return Err(crate::Error::Config(
                "default_per_page must be between 1 and max_per_page".into(),
            ));
        }
        Ok(())
    }

    /// Port override from the environment, falling back to the configured one
    pub fn port(&self) -> u16 {
        std::env::var(PORT_ENV)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.server.port)
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# citifix configuration

[server]
host = "127.0.0.1"
# Overridden by CITIFIX_API_PORT
port = 3848

[geo]
# Default radius for nearby issue listings (km)
nearby_radius_km = 5.0

# Same-category open issues closer than this are flagged as duplicates (km)
duplicate_radius_km = 0.1

[rules]
# Votes needed before a reported issue is verified automatically
auto_verify_threshold = 3

[pagination]
default_per_page = 15
max_per_page = 100

[media]
# Bytes per uploaded file
max_file_size = 10485760

# Files per upload
max_files = 5
"#
        .to_string()
    }
}

/// Resolve the data directory: explicit path, then $CITIFIX_DATA_DIR, then
/// the platform local data dir.
pub fn data_dir(explicit: Option<&Path>) -> crate::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("citifix")))
        .ok_or_else(|| crate::Error::Config("Could not determine data directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commented_template_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.geo.duplicate_radius_km, 0.1);
        assert_eq!(config.geo.nearby_radius_km, 5.0);
        assert_eq!(config.rules.auto_verify_threshold, 3);
        assert_eq!(config.media.max_file_size, 10 * 1024 * 1024);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.pagination.default_per_page, 15);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rules]\nauto_verify_threshold = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.rules.auto_verify_threshold, 5);
        assert_eq!(config.geo.duplicate_radius_km, 0.1);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rules]\nauto_verify_threshold = 0\n").unwrap();

        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));
    }
}
