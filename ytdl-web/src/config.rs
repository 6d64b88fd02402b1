//! Process configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::server::ApiServerConfig;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Directory downloads are written to
    pub download_dir: PathBuf,
    /// Path or name of the yt-dlp executable
    pub ytdlp_path: String,
    /// Interval between broadcast ticks
    pub broadcast_tick: Duration,
    /// Directory for rotated log files
    pub log_dir: String,
    /// Front-end assets, served when the directory exists
    pub static_dir: PathBuf,
    /// Age after which finished jobs are dropped from the registry.
    /// `None` keeps them for the process lifetime.
    pub job_retention: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            download_dir: PathBuf::from("./downloads"),
            ytdlp_path: "yt-dlp".to_string(),
            broadcast_tick: Duration::from_millis(500),
            log_dir: "./logs".to_string(),
            static_dir: PathBuf::from("./static"),
            job_retention: None,
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS`, `API_PORT`, `ENABLE_CORS`
    /// - `DOWNLOAD_DIR`, `YTDLP_PATH`, `STATIC_DIR`, `LOG_DIR`
    /// - `BROADCAST_TICK_MS` (must be > 0)
    /// - `JOB_RETENTION_SECS` (unset keeps jobs forever)
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env_or_default`] with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind_address) = non_empty("API_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        if let Some(port) = non_empty("API_PORT")
            && let Ok(parsed) = port.trim().parse::<u16>()
        {
            config.port = parsed;
        }

        if let Some(cors) = non_empty("ENABLE_CORS") {
            config.enable_cors = ytdl_options::parse_bool_token(&cors);
        }

        if let Some(dir) = non_empty("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(path) = non_empty("YTDLP_PATH") {
            config.ytdlp_path = path;
        }

        if let Some(dir) = non_empty("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        if let Some(dir) = non_empty("LOG_DIR") {
            config.log_dir = dir;
        }

        if let Some(tick) = non_empty("BROADCAST_TICK_MS")
            && let Ok(ms) = tick.trim().parse::<u64>()
            && ms > 0
        {
            config.broadcast_tick = Duration::from_millis(ms);
        }

        if let Some(secs) = non_empty("JOB_RETENTION_SECS")
            && let Ok(secs) = secs.trim().parse::<u64>()
            && secs > 0
        {
            config.job_retention = Some(Duration::from_secs(secs));
        }

        config
    }

    /// Settings for the HTTP server.
    pub fn api_server_config(&self) -> ApiServerConfig {
        ApiServerConfig {
            bind_address: self.bind_address.clone(),
            port: self.port,
            enable_cors: self.enable_cors,
            static_dir: self.static_dir.is_dir().then(|| self.static_dir.clone()),
            ..ApiServerConfig::default()
        }
    }
}
