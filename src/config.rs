use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "MedMentor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Language assumed for patients that never chose one.
pub const DEFAULT_LANGUAGE: &str = "hi";
/// Template table fallback when a patient's language has no reminder text.
pub const FALLBACK_TEMPLATE_LANGUAGE: &str = "en";

/// Alerts shown per patient on the doctor dashboard.
pub const RECENT_ALERTS_LIMIT: usize = 10;
pub const DEFAULT_RECENT_DOSES: usize = 10;

pub const DEFAULT_AI_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TRANSLATE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_EVENT_QUEUE: usize = 256;
pub const DEFAULT_STREAM_BUFFER: usize = 128;
pub const SSE_KEEP_ALIVE_SECS: u64 = 15;
/// Largest batch accepted by the skip-dose endpoint.
pub const MAX_SKIPS_PER_REQUEST: u32 = 20;
/// Upload cap for voice recordings.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medmentor_lib=info,medmentor=info,tower_http=warn"
}

/// Get the application data directory (~/MedMentor/)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medmentor.db")
}

/// How `record_skip_dose` turns a batch of skips into alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipBatchPolicy {
    /// One alert per skipped unit plus a summary alert (N + 1 alerts).
    PerUnit,
    /// Persist N skipped doses but raise a single alert sized by N.
    Summary,
}

impl FromStr for SkipBatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_unit" => Ok(Self::PerUnit),
            "summary" => Ok(Self::Summary),
            other => Err(format!("unknown skip batch policy: {other}")),
        }
    }
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub ai_service_url: String,
    pub ai_timeout_secs: u64,
    pub translate_timeout_secs: u64,
    pub event_queue_capacity: usize,
    pub stream_buffer: usize,
    pub seed_demo_data: bool,
    pub notify_patient_on_skip: bool,
    pub skip_batch_policy: SkipBatchPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            db_path: default_db_path(),
            ai_service_url: DEFAULT_AI_SERVICE_URL.to_string(),
            ai_timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
            translate_timeout_secs: DEFAULT_TRANSLATE_TIMEOUT_SECS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            seed_demo_data: true,
            notify_patient_on_skip: true,
            skip_batch_policy: SkipBatchPolicy::PerUnit,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let db_path = lookup("MEDMENTOR_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let ai_service_url = lookup("AI_SERVICE_URL").unwrap_or(defaults.ai_service_url);

        Self {
            bind_addr: parsed(&lookup, "MEDMENTOR_BIND", defaults.bind_addr),
            db_path,
            ai_service_url,
            ai_timeout_secs: parsed(&lookup, "AI_TIMEOUT_SECS", defaults.ai_timeout_secs),
            translate_timeout_secs: parsed(
                &lookup,
                "AI_TRANSLATE_TIMEOUT_SECS",
                defaults.translate_timeout_secs,
            ),
            event_queue_capacity: parsed(&lookup, "MEDMENTOR_EVENT_QUEUE", defaults.event_queue_capacity)
                .max(1),
            stream_buffer: parsed(&lookup, "MEDMENTOR_STREAM_BUFFER", defaults.stream_buffer).max(1),
            seed_demo_data: parsed(&lookup, "MEDMENTOR_SEED_DEMO", defaults.seed_demo_data),
            notify_patient_on_skip: parsed(
                &lookup,
                "MEDMENTOR_NOTIFY_ON_SKIP",
                defaults.notify_patient_on_skip,
            ),
            skip_batch_policy: parsed(&lookup, "MEDMENTOR_SKIP_BATCH", defaults.skip_batch_policy),
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid config value, using default");
                default
            }
        },
        None => default,
    }
}
