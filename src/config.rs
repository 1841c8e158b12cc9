use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::KnownFeeds;
use crate::error::ConfigError;
use crate::http::BROWSER_USER_AGENT;
use crate::transcription::WhisperApiSettings;

/// Official feed fallback shipped by default (All Ears English)
pub const DEFAULT_KNOWN_FEEDS: &str = "751574016=https://www.allearsenglish.com/feed/";

pub const DEFAULT_LOOKUP_ENDPOINT: &str = "https://itunes.apple.com/lookup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runtime settings, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub audio_storage_path: PathBuf,
    pub public_audio_prefix: String,
    pub feed_timeout: Duration,
    pub lookup_timeout: Duration,
    pub scrape_timeout: Duration,
    /// Longest silence tolerated on any socket read, including audio bodies
    pub download_read_timeout: Duration,
    pub user_agent: String,
    /// Skip certificate validation for feed and webpage fetches.
    ///
    /// Many podcast hosts present broken chains. This weakens transport integrity
    /// for those requests, so operators can switch it off.
    pub insecure_tls: bool,
    pub lookup_endpoint: String,
    pub known_feeds: KnownFeeds,
    pub ytdlp_path: String,
    pub transcription: Option<WhisperApiSettings>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_storage_path: PathBuf::from("./storage/audio"),
            public_audio_prefix: "/audio".to_string(),
            feed_timeout: Duration::from_secs(60),
            lookup_timeout: Duration::from_secs(10),
            scrape_timeout: Duration::from_secs(30),
            download_read_timeout: Duration::from_secs(60),
            user_agent: BROWSER_USER_AGENT.to_string(),
            insecure_tls: true,
            lookup_endpoint: DEFAULT_LOOKUP_ENDPOINT.to_string(),
            known_feeds: KnownFeeds::parse(DEFAULT_KNOWN_FEEDS).unwrap_or_default(),
            ytdlp_path: "yt-dlp".to_string(),
            transcription: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::Invalid {
                        key: key.to_string(),
                        value,
                    }),
                None => Ok(default),
            }
        };

        let flag = |key: &str, default: bool| -> Result<bool, ConfigError> {
            match get(key) {
                Some(value) => match value.to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    _ => Err(ConfigError::Invalid {
                        key: key.to_string(),
                        value,
                    }),
                },
                None => Ok(default),
            }
        };

        let log_format = match get("LOG_FORMAT") {
            Some(value) => match value.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT".to_string(),
                        value,
                    });
                }
            },
            None => defaults.log_format,
        };

        let known_feeds = match lookup("KNOWN_FEEDS") {
            Some(spec) => KnownFeeds::parse(&spec)?,
            None => defaults.known_feeds,
        };

        let transcription = match get("TRANSCRIPTION_API_KEY").or_else(|| get("GROQ_API_KEY")) {
            Some(api_key) => {
                let max_upload_bytes = match get("TRANSCRIPTION_MAX_UPLOAD_BYTES") {
                    Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                        key: "TRANSCRIPTION_MAX_UPLOAD_BYTES".to_string(),
                        value,
                    })?,
                    None => 25_000_000,
                };
                Some(WhisperApiSettings {
                    api_key,
                    base_url: get("TRANSCRIPTION_BASE_URL")
                        .unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
                    model: get("TRANSCRIPTION_MODEL")
                        .unwrap_or_else(|| "whisper-large-v3".to_string()),
                    language: Some(get("TRANSCRIPTION_LANGUAGE").unwrap_or_else(|| "en".to_string()))
                        .filter(|l| l != "auto"),
                    max_upload_bytes,
                    ffmpeg: get("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
                    timeout: secs("TRANSCRIPTION_TIMEOUT_SECS", Duration::from_secs(600))?,
                })
            }
            None => None,
        };

        Ok(Self {
            audio_storage_path: get("AUDIO_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.audio_storage_path),
            public_audio_prefix: get("PUBLIC_AUDIO_PREFIX").unwrap_or(defaults.public_audio_prefix),
            feed_timeout: secs("FEED_TIMEOUT_SECS", defaults.feed_timeout)?,
            lookup_timeout: secs("LOOKUP_TIMEOUT_SECS", defaults.lookup_timeout)?,
            scrape_timeout: secs("SCRAPE_TIMEOUT_SECS", defaults.scrape_timeout)?,
            download_read_timeout: secs(
                "DOWNLOAD_READ_TIMEOUT_SECS",
                defaults.download_read_timeout,
            )?,
            user_agent: get("HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
            insecure_tls: flag("INSECURE_TLS", defaults.insecure_tls)?,
            lookup_endpoint: get("PLATFORM_LOOKUP_URL").unwrap_or(defaults.lookup_endpoint),
            known_feeds,
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            transcription,
            log_format,
        })
    }
}
