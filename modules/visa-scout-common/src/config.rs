use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

use crate::error::ScoutError;

pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Run configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Paths
    pub data_dir: PathBuf,
    pub resumes_dir: PathBuf,
    pub sponsor_register_path: PathBuf,
    pub career_pages_file: PathBuf,

    // Limits
    pub max_companies: usize,
    pub daily_job_limit: usize,
    pub concurrent_browsers: usize,
    pub search_batch_size: usize,
    pub search_result_limit: usize,
    pub scoring_concurrency: usize,
    pub min_resume_match: u8,

    // Timeouts
    pub render_timeout: Duration,
    pub probe_timeout: Duration,

    // LLM
    pub llm_enabled: bool,
    pub llm_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,

    // Search / rendering
    pub serper_api_key: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub chrome_bin: String,
    pub pdftotext_bin: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let sponsor_register_path = get("SPONSOR_REGISTER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("sponsor_register.csv"));

        let config = Self {
            resumes_dir: PathBuf::from(get("RESUMES_DIR").unwrap_or_else(|| "resumes".to_string())),
            career_pages_file: PathBuf::from(
                get("CAREER_PAGES_FILE").unwrap_or_else(|| "career_pages.json".to_string()),
            ),
            sponsor_register_path,
            data_dir,
            max_companies: parse_or("MAX_COMPANIES", get("MAX_COMPANIES"), 150)?,
            daily_job_limit: parse_or("DAILY_JOB_LIMIT", get("DAILY_JOB_LIMIT"), 25)?,
            concurrent_browsers: parse_or("CONCURRENT_BROWSERS", get("CONCURRENT_BROWSERS"), 4)?,
            search_batch_size: parse_or("SEARCH_BATCH_SIZE", get("SEARCH_BATCH_SIZE"), 10)?,
            search_result_limit: parse_or("SEARCH_RESULT_LIMIT", get("SEARCH_RESULT_LIMIT"), 5)?,
            scoring_concurrency: parse_or("SCORING_CONCURRENCY", get("SCORING_CONCURRENCY"), 4)?,
            min_resume_match: parse_or("MIN_RESUME_MATCH", get("MIN_RESUME_MATCH"), 0)?,
            render_timeout: Duration::from_secs(parse_or(
                "RENDER_TIMEOUT_SECS",
                get("RENDER_TIMEOUT_SECS"),
                30,
            )?),
            probe_timeout: Duration::from_secs(parse_or(
                "PROBE_TIMEOUT_SECS",
                get("PROBE_TIMEOUT_SECS"),
                10,
            )?),
            llm_enabled: parse_bool("LLM_ENABLED", get("LLM_ENABLED"), true)?,
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            serper_api_key: get("SERPER_API_KEY"),
            browserless_url: get("BROWSERLESS_URL"),
            browserless_token: get("BROWSERLESS_TOKEN"),
            chrome_bin: get("CHROME_BIN").unwrap_or_else(|| "chromium".to_string()),
            pdftotext_bin: get("PDFTOTEXT_BIN").unwrap_or_else(|| "pdftotext".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject tunables that would stall or empty the run.
    pub fn validate(&self) -> Result<(), ScoutError> {
        let positive = [
            ("MAX_COMPANIES", self.max_companies as u64),
            ("DAILY_JOB_LIMIT", self.daily_job_limit as u64),
            ("CONCURRENT_BROWSERS", self.concurrent_browsers as u64),
            ("SEARCH_BATCH_SIZE", self.search_batch_size as u64),
            ("SEARCH_RESULT_LIMIT", self.search_result_limit as u64),
            ("SCORING_CONCURRENCY", self.scoring_concurrency as u64),
            ("RENDER_TIMEOUT_SECS", self.render_timeout.as_secs()),
            ("PROBE_TIMEOUT_SECS", self.probe_timeout.as_secs()),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ScoutError::Config(format!("{key} must be at least 1")));
            }
        }
        if self.min_resume_match > 100 {
            return Err(ScoutError::Config(
                "MIN_RESUME_MATCH must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }

    /// LLM scoring runs only when enabled and a key is present.
    pub fn llm_available(&self) -> bool {
        self.llm_enabled && self.openai_api_key.is_some()
    }

    pub fn seen_store_path(&self) -> PathBuf {
        self.data_dir.join("jobs_seen.json")
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(5).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  SERPER_API_KEY: {}", preview_opt(&self.serper_api_key));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!(
            "  BROWSERLESS_URL: {}",
            self.browserless_url.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  LLM: enabled={} model={}", self.llm_enabled, self.llm_model);
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ScoutError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ScoutError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, ScoutError> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ScoutError::Config(format!(
            "{key} must be true or false, got {other:?}"
        ))),
    }
}
