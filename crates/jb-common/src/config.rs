use serde::Deserialize;

/// Top-level application configuration.
/// Loaded from environment variables and/or config files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Redis settings (only needed for the redis cache backend)
    #[serde(default)]
    pub redis: RedisConfig,
    /// Bundle cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Outbound fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Archive settings
    #[serde(default)]
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP API port (default: 8080)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Largest accepted request body in bytes (default: 64 KiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Which store keeps assembled bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on restart.
    #[default]
    Memory,
    /// Shared Redis instance; eviction handled by key expiry.
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Entry lifetime in seconds (default: 31536000 = 1 year)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Prefix of the synthetic lookup identifier for each entry
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User-Agent attached to every origin request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-file timeout in seconds (default: 30)
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Largest accepted file in bytes (default: 100 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// URL prefixes files may be downloaded from.
    /// Set as a comma-separated list via `JB__FETCH__ALLOWED_PREFIXES`.
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// Archive name used when the request does not supply one
    #[serde(default = "default_bundle_filename")]
    pub default_filename: String,
    /// Extension every archive member must carry
    #[serde(default = "default_member_suffix")]
    pub member_suffix: String,
    /// Maximum number of files in one bundle
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl AppConfig {
    /// Load config from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("jarbundle").required(false))
            .add_source(
                config::Environment::default()
                    .prefix("JB")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fetch.allowed_prefixes"),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            log_level: default_log_level(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_cache_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout(),
            max_file_bytes: default_max_file_bytes(),
            allowed_prefixes: default_allowed_prefixes(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            default_filename: default_bundle_filename(),
            member_suffix: default_member_suffix(),
            max_files: default_max_files(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_cache_ttl() -> u64 {
    31_536_000
}
fn default_key_prefix() -> String {
    "jb:bundle:".to_string()
}
fn default_user_agent() -> String {
    format!("jarbundle/{} (plugin bundle proxy)", env!("CARGO_PKG_VERSION"))
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_max_file_bytes() -> u64 {
    100 * 1024 * 1024
}
fn default_allowed_prefixes() -> Vec<String> {
    [
        "https://github.com/",
        "https://objects.githubusercontent.com/",
        "https://cdn.modrinth.com/",
        "https://hangarcdn.papermc.io/",
        "https://api.spiget.org/",
        "https://download.geysermc.org/",
        "https://ci.ender.zone/",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
fn default_bundle_filename() -> String {
    "plugins.zip".to_string()
}
fn default_member_suffix() -> String {
    ".jar".to_string()
}
fn default_max_files() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.api_port, 8080);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.bundle.member_suffix, ".jar");
        assert_eq!(config.bundle.default_filename, "plugins.zip");
        assert!(config
            .fetch
            .allowed_prefixes
            .iter()
            .any(|p| p == "https://github.com/"));
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let cfg = config::Config::builder()
            .set_override("cache.backend", "redis")
            .unwrap()
            .set_override("fetch.timeout_secs", 5)
            .unwrap()
            .build()
            .unwrap();
        let config: AppConfig = cfg.try_deserialize().unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.key_prefix, "jb:bundle:");
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.max_file_bytes, 100 * 1024 * 1024);
    }
}
