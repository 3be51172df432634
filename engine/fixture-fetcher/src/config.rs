use crate::error::{FetcherError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Configuration for the fixture fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Upstream fixtures API configuration
    pub upstream: UpstreamConfig,

    /// Aggregation configuration
    pub aggregation: AggregationConfig,

    /// Retry configuration for rate-limited requests
    pub retry: RetryConfig,

    /// Last-good snapshot configuration
    pub snapshot: SnapshotSettings,

    /// Match prediction configuration
    pub prediction: PredictionConfig,

    /// Raw payload dump configuration
    pub debug: DebugConfig,

    /// Report output configuration
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API key environment variable name
    pub api_key_env: String,

    /// Value sent in the X-RapidAPI-Host header
    pub host: String,

    /// Base URL, without trailing slash
    pub base_url: String,

    /// Divisions to fetch, in order
    pub divisions: Vec<DivisionConfig>,

    /// Requested records per page
    pub page_size: u32,

    /// Value of the `include` query parameter
    pub include: String,

    /// Per-call HTTP timeout in seconds
    pub http_timeout_secs: u64,

    /// Secondary rank lookup URL templates, tried in order.
    /// Placeholders: `{base}`, `{division}`, `{id}`.
    pub rank_lookup_templates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DivisionConfig {
    /// Path segment used by the upstream API (e.g. "atp")
    pub key: String,

    /// Display label (e.g. "ATP Tour")
    pub label: String,
}

/// How many days and pages a run covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayWindow {
    /// Today only, first page only
    Reduced,
    /// Yesterday, today and tomorrow, paginated up to the page cap
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Day window mode
    pub mode: DayWindow,

    /// Maximum fixtures kept per division
    pub max_matches_per_division: usize,

    /// Maximum pages fetched per division and day in full mode
    pub max_pages: u32,

    /// Tournament names containing any of these (case-insensitive) are dropped
    pub exclude_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts for a rate-limited request
    pub max_attempts: u32,

    /// Initial retry delay in seconds
    pub initial_delay_secs: u64,

    /// Maximum retry delay in seconds
    pub max_delay_secs: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSettings {
    /// Location of the last-good snapshot
    pub path: PathBuf,

    /// Gzip the snapshot file
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// API key environment variable name. Predictions are skipped when unset.
    pub api_key_env: String,

    /// Generative model name
    pub model: String,

    /// Base URL of the generative language API
    pub base_url: String,

    /// Fixed delay between prediction calls in milliseconds
    pub delay_ms: u64,

    /// Upper bound on predictions per run
    pub max_predictions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Write the first raw record, participant and tournament of the run to disk
    pub dump: bool,

    /// Directory receiving the dump files
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where the JSON report for the renderer is written
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                api_key_env: "RAPID_API_KEY".to_string(),
                host: "tennis-api-atp-wta-itf.p.rapidapi.com".to_string(),
                base_url: "https://tennis-api-atp-wta-itf.p.rapidapi.com".to_string(),
                divisions: vec![
                    DivisionConfig {
                        key: "atp".to_string(),
                        label: "ATP Tour".to_string(),
                    },
                    DivisionConfig {
                        key: "wta".to_string(),
                        label: "WTA Tour".to_string(),
                    },
                ],
                page_size: 50,
                include: "tournament,round,court,player1,player2".to_string(),
                http_timeout_secs: 20,
                rank_lookup_templates: vec![
                    "{base}/tennis/v2/{division}/player/{id}".to_string(),
                    "{base}/tennis/v2/{division}/ranking/singles/{id}".to_string(),
                    "{base}/tennis/v2/{division}/player/profile/{id}".to_string(),
                ],
            },
            aggregation: AggregationConfig {
                mode: DayWindow::Full,
                max_matches_per_division: 40,
                max_pages: 5,
                exclude_keywords: default_exclude_keywords(),
            },
            retry: RetryConfig {
                max_attempts: 4,
                initial_delay_secs: 2,
                max_delay_secs: 60,
                backoff_multiplier: 2.0,
            },
            snapshot: SnapshotSettings {
                path: PathBuf::from("./data/last_good_snapshot.json"),
                compress: false,
            },
            prediction: PredictionConfig {
                api_key_env: "GEMINI_API_KEY".to_string(),
                model: "gemini-1.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                delay_ms: 4_000,
                max_predictions: 30,
            },
            debug: DebugConfig {
                dump: false,
                dir: PathBuf::from("./debug"),
            },
            output: OutputConfig {
                report_path: PathBuf::from("./data/matches.json"),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Logging settings from `LOG_LEVEL` and `LOG_FORMAT`.
    ///
    /// Readable before the rest of the configuration, so the subscriber is
    /// installed before anything else gets a chance to log.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_FORMAT").ok(),
        )
    }

    /// Apply non-blank overrides on top of these settings
    pub fn with_overrides(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level.trim().to_string();
        }
        if let Some(format) = format.filter(|f| !f.trim().is_empty()) {
            self.format = format.trim().to_ascii_lowercase();
        }
        self
    }
}

fn default_exclude_keywords() -> Vec<String> {
    ["challenger", "itf", "utr", "doubles", "qualifying", "exhibition", "junior"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl FromStr for DayWindow {
    type Err = FetcherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reduced" | "today" | "single" => Ok(DayWindow::Reduced),
            "full" | "window" => Ok(DayWindow::Full),
            other => Err(FetcherError::config(format!("unknown day window mode '{other}'"))),
        }
    }
}

impl DayWindow {
    /// Calendar days to fetch, in fetch order
    pub fn days(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match self {
            DayWindow::Reduced => vec![today],
            DayWindow::Full => vec![today - Duration::days(1), today, today + Duration::days(1)],
        }
    }

    /// Page cap per division and day
    pub fn page_cap(&self, max_pages: u32) -> u32 {
        match self {
            DayWindow::Reduced => 1,
            DayWindow::Full => max_pages.max(1),
        }
    }
}

impl FetcherConfig {
    /// Load configuration from environment variables.
    ///
    /// Values that fail to parse keep their defaults and are reported with
    /// `warn!`, so install the subscriber first (see [`LoggingConfig::from_env`]).
    /// The upstream API key is the only required setting.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("RAPID_API_HOST") {
            config.upstream.host = host;
        }

        if let Ok(base_url) = std::env::var("FIXTURES_BASE_URL") {
            config.upstream.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Ok(divisions) = std::env::var("FIXTURES_DIVISIONS") {
            let parsed: Vec<DivisionConfig> = split_list(&divisions)
                .into_iter()
                .map(|key| DivisionConfig {
                    label: format!("{} Tour", key.to_uppercase()),
                    key,
                })
                .collect();
            if !parsed.is_empty() {
                config.upstream.divisions = parsed;
            }
        }

        if let Ok(mode) = std::env::var("FIXTURES_MODE") {
            match mode.parse() {
                Ok(mode) => config.aggregation.mode = mode,
                Err(e) => warn!("Ignoring FIXTURES_MODE: {}", e),
            }
        }

        if let Ok(keywords) = std::env::var("FIXTURES_EXCLUDE") {
            config.aggregation.exclude_keywords = split_list(&keywords);
        }

        override_from_env("FIXTURES_MAX_MATCHES", &mut config.aggregation.max_matches_per_division);
        override_from_env("FIXTURES_MAX_PAGES", &mut config.aggregation.max_pages);
        override_from_env("FIXTURES_PAGE_SIZE", &mut config.upstream.page_size);
        override_from_env("FIXTURES_HTTP_TIMEOUT_SECS", &mut config.upstream.http_timeout_secs);
        override_from_env("FIXTURES_RETRY_MAX_ATTEMPTS", &mut config.retry.max_attempts);
        override_from_env("FIXTURES_RETRY_BASE_SECS", &mut config.retry.initial_delay_secs);
        override_from_env("FIXTURES_RETRY_MAX_SECS", &mut config.retry.max_delay_secs);
        override_from_env("FIXTURES_SNAPSHOT_PATH", &mut config.snapshot.path);
        override_from_env("FIXTURES_SNAPSHOT_COMPRESS", &mut config.snapshot.compress);
        override_from_env("FIXTURES_OUTPUT_PATH", &mut config.output.report_path);
        override_from_env("FIXTURES_DEBUG_DUMP", &mut config.debug.dump);
        override_from_env("FIXTURES_DEBUG_DIR", &mut config.debug.dir);
        override_from_env("FIXTURES_PREDICTION_DELAY_MS", &mut config.prediction.delay_ms);
        override_from_env("FIXTURES_MAX_PREDICTIONS", &mut config.prediction.max_predictions);
        override_from_env("GEMINI_MODEL", &mut config.prediction.model);
        config.logging = LoggingConfig::from_env();

        config.validate()?;

        // Fail at startup rather than on the first request
        config.get_api_key()?;

        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.upstream.divisions.is_empty() {
            return Err(FetcherError::config("at least one division is required"));
        }
        if self.upstream.page_size == 0 {
            return Err(FetcherError::config("page_size must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(FetcherError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(FetcherError::config("retry.backoff_multiplier must be >= 1.0"));
        }
        if self.retry.max_delay_secs < self.retry.initial_delay_secs {
            return Err(FetcherError::config("retry.max_delay_secs must be >= initial_delay_secs"));
        }
        Ok(())
    }

    /// Get the upstream API key from environment
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.upstream.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| FetcherError::MissingEnv(self.upstream.api_key_env.clone()))
    }

    /// Get the prediction API key from environment, if configured
    pub fn get_prediction_api_key(&self) -> Option<String> {
        std::env::var(&self.prediction.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Per-call HTTP timeout
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream.http_timeout_secs)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn override_from_env<T: FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}={:?}: could not parse value", name, raw),
        }
    }
}
