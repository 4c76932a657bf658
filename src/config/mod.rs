use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::{PipelineSettings, SpecialUser};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extraction API configuration
    pub api: ApiConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Extraction endpoint (the source URL is sent as the `url` query parameter)
    pub base_url: String,

    /// API key forwarded as `x-rapidapi-key`
    pub key: String,

    /// API host forwarded as `x-rapidapi-host`
    pub host: String,

    /// Position in the returned link list that holds the downloadable video
    pub link_index: usize,

    /// Timeout for the extraction call in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scratch directory for downloads (defaults to the user cache directory)
    pub workspace_dir: Option<PathBuf>,

    /// Where the console sink copies delivered videos
    pub output_dir: PathBuf,

    /// Videos larger than this are compressed before delivery
    pub size_threshold_mb: u64,

    /// Constant rate factor used when compressing
    pub compression_crf: u8,

    /// Limit on downloading the video from its direct URL
    pub fetch_timeout_secs: u64,

    /// Hard limit on a single compression run
    pub transcode_timeout_secs: u64,

    /// Limit on waiting for a free compression slot
    pub transcode_queue_timeout_secs: u64,

    /// Workspace files older than this are swept
    pub retention_secs: u64,

    /// Maximum number of compressions running at once
    pub max_concurrent_transcodes: usize,

    /// Interval between "processing" status frames
    pub status_interval_ms: u64,

    /// ffmpeg binary
    pub ffmpeg_path: String,

    /// ffprobe binary
    pub ffprobe_path: String,

    /// Requester that gets an extra message after each delivery
    pub special_user: Option<SpecialUserConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialUserConfig {
    pub id: String,
    pub message: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://social-download-all-in-one.p.rapidapi.com/v1/social/autolink"
                .to_string(),
            key: "".to_string(),
            host: "social-download-all-in-one.p.rapidapi.com".to_string(),
            link_index: 1,
            request_timeout_secs: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            output_dir: PathBuf::from("deliveries"),
            size_threshold_mb: 8,
            compression_crf: 28,
            fetch_timeout_secs: 120,
            transcode_timeout_secs: 60,
            transcode_queue_timeout_secs: 120,
            retention_secs: 600,
            max_concurrent_transcodes: 2,
            status_interval_ms: 1000,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            special_user: None,
        }
    }
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            Self::from_yaml(&content)?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a YAML document; missing keys take their default values
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("reelrelay").join("config.yaml"))
    }

    /// Override secrets and identities from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = lookup("API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(key) = lookup("KEY") {
            self.api.key = key;
        }
        if let Some(host) = lookup("HOST") {
            self.api.host = host;
        }
        if let Some(dir) = lookup("RELAY_WORKSPACE_DIR") {
            self.app.workspace_dir = Some(PathBuf::from(dir));
        }
        if let Some(id) = lookup("SPECIAL_USER_ID") {
            match &mut self.app.special_user {
                Some(special) => special.id = id,
                None => {
                    self.app.special_user = Some(SpecialUserConfig {
                        id,
                        message: "Here you go, as always.".to_string(),
                    })
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("Extraction API base URL must be configured");
        }
        url::Url::parse(&self.api.base_url).context("Extraction API base URL is invalid")?;

        if self.api.key.trim().is_empty() {
            anyhow::bail!("Extraction API key must be configured (set KEY or api.key)");
        }

        if self.app.size_threshold_mb == 0 {
            anyhow::bail!("size_threshold_mb must be greater than zero");
        }

        if self.app.transcode_timeout_secs == 0
            || self.app.transcode_queue_timeout_secs == 0
            || self.app.fetch_timeout_secs == 0
            || self.api.request_timeout_secs == 0
        {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        let longest_run = self.longest_run_secs();
        if self.app.retention_secs <= longest_run {
            anyhow::bail!(
                "retention_secs ({}) must exceed the longest possible request ({}s: extraction + fetch + compression queue + compression timeouts)",
                self.app.retention_secs,
                longest_run
            );
        }

        if self.app.max_concurrent_transcodes == 0 {
            anyhow::bail!("max_concurrent_transcodes must be at least 1");
        }

        if self.app.compression_crf > 51 {
            anyhow::bail!("compression_crf must be between 0 and 51");
        }

        Ok(())
    }

    /// Scratch directory used for in-flight downloads
    pub fn workspace_dir(&self) -> PathBuf {
        self.app.workspace_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("reelrelay")
                .join("videos")
        })
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.app.transcode_timeout_secs)
    }

    pub fn transcode_queue_timeout(&self) -> Duration {
        Duration::from_secs(self.app.transcode_queue_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.app.fetch_timeout_secs)
    }

    /// Upper bound on how long a request's scratch files can be in use
    pub fn longest_run_secs(&self) -> u64 {
        self.api
            .request_timeout_secs
            .saturating_add(self.app.fetch_timeout_secs)
            .saturating_add(self.app.transcode_queue_timeout_secs)
            .saturating_add(self.app.transcode_timeout_secs)
    }

    /// Settings handed to the pipeline at construction
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            workspace_dir: self.workspace_dir(),
            size_threshold_bytes: self.app.size_threshold_mb * MIB,
            compression_crf: self.app.compression_crf,
            retention: Duration::from_secs(self.app.retention_secs),
            status_interval: Duration::from_millis(self.app.status_interval_ms),
            special_user: self.app.special_user.as_ref().map(|special| SpecialUser {
                id: special.id.clone(),
                message: special.message.clone(),
            }),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Endpoint: {}", self.api.base_url);
        println!("  API Host: {}", self.api.host);
        println!(
            "  API Key: {}",
            if self.api.key.is_empty() { "(not set)" } else { "(set)" }
        );
        println!("  Link Index: {}", self.api.link_index);
        println!("  Workspace: {}", self.workspace_dir().display());
        println!("  Output Directory: {}", self.app.output_dir.display());
        println!("  Size Threshold: {} MB", self.app.size_threshold_mb);
        println!("  Compression CRF: {}", self.app.compression_crf);
        println!("  Fetch Timeout: {}s", self.app.fetch_timeout_secs);
        println!("  Transcode Timeout: {}s", self.app.transcode_timeout_secs);
        println!("  Transcode Queue Timeout: {}s", self.app.transcode_queue_timeout_secs);
        println!("  Retention: {}s", self.app.retention_secs);
        println!("  Concurrent Transcodes: {}", self.app.max_concurrent_transcodes);
    }

    /// Print where the config file lives so it can be edited
    pub async fn interactive_setup(&self) -> Result<()> {
        println!("Edit the config file to change settings:");
        println!("  {}", Self::config_path()?.display());
        println!("Secrets can also come from the environment: API_BASE_URL, KEY, HOST");
        Ok(())
    }
}
