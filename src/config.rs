use std::env;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Concurrent pre-work engine tasks per fan-out pass
    pub fan_out_concurrency: usize,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// Keyboard edits per second during the fan-out completion loop
    pub edits_per_sec: u32,
    /// Videos above this size are searched via their thumbnail (bytes)
    pub max_video_bytes: u64,
    /// Data directory for the filesystem image host
    pub data_dir: String,
    /// SauceNAO API key; best-match lookups are disabled without it
    pub saucenao_api_key: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            fan_out_concurrency: 5,
            timeout_secs: 30,
            edits_per_sec: 1,
            max_video_bytes: 20_000_000,
            data_dir: "./data".to_string(),
            saucenao_api_key: None,
        }
    }
}

impl BotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the optional settings from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("BOT_DATA_DIR") {
            config.data_dir = dir;
        }
        if let Ok(key) = env::var("SAUCENAO_API_KEY") {
            if !key.is_empty() {
                config.saucenao_api_key = Some(key);
            }
        }
        config
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fan_out_concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_edit_rate(mut self, edits_per_sec: u32) -> Self {
        self.edits_per_sec = edits_per_sec;
        self
    }
}
