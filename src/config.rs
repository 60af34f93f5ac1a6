use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::models::ListingKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub tracker: TrackerConfig,
    pub notifications: NotificationsConfig,
    pub export: ExportConfig,
    pub targets: Vec<WatchTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub lock_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout: u64,
    pub scroll_stability_rounds: u32,
    pub max_scroll_rounds: u32,
    pub scroll_settle_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Percent-drop magnitude for products, match score for jobs.
    pub threshold: f64,
    pub skills: Vec<String>,
    pub skill_bonus: f64,
    /// Reference document for job matching; required when a job target is
    /// configured.
    pub reference_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub webhook_url: Option<String>,
    pub max_alerts_per_run: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub path: String,
}

/// One category page or job search to scrape each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTarget {
    pub name: String,
    pub url: String,
    pub kind: ListingKind,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "DRIFT_"
            .add_source(Environment::with_prefix("DRIFT").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.fetcher.chrome_path.is_none() {
            config.fetcher.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.lock_path.is_empty() {
            return Err(ConfigError::Message(
                "Database lock_path must not be empty".into(),
            ));
        }

        if self.tracker.threshold <= 0.0 {
            return Err(ConfigError::Message(
                "Tracker threshold must be greater than 0".into(),
            ));
        }

        if self.fetcher.max_retries == 0 {
            return Err(ConfigError::Message(
                "Fetcher max_retries must be greater than 0".into(),
            ));
        }

        if self.fetcher.scroll_stability_rounds == 0 {
            return Err(ConfigError::Message(
                "Fetcher scroll_stability_rounds must be greater than 0".into(),
            ));
        }

        if self.fetcher.max_scroll_rounds < self.fetcher.scroll_stability_rounds {
            return Err(ConfigError::Message(
                "Fetcher max_scroll_rounds cannot be below scroll_stability_rounds".into(),
            ));
        }

        if let Some(webhook_url) = &self.notifications.webhook_url {
            if Url::parse(webhook_url).is_err() {
                return Err(ConfigError::Message("Invalid webhook URL format".into()));
            }
        }

        if self.export.path.is_empty() {
            return Err(ConfigError::Message("Export path must not be empty".into()));
        }

        for target in &self.targets {
            if target.name.is_empty() {
                return Err(ConfigError::Message("Target name must not be empty".into()));
            }
            if Url::parse(&target.url).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid URL for target '{}'",
                    target.name
                )));
            }
        }

        let has_job_target = self.targets.iter().any(|t| t.kind == ListingKind::Job);
        if has_job_target && self.tracker.reference_path.is_none() {
            return Err(ConfigError::Message(
                "tracker.reference_path is required when a job target is configured".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "sqlite://data/listings.db".to_string(),
                lock_path: "data/run.lock".to_string(),
            },
            fetcher: FetcherConfig {
                max_retries: 3,
                retry_delay_ms: 2000,
                request_timeout: 30,
                scroll_stability_rounds: 3,
                max_scroll_rounds: 9,
                scroll_settle_ms: 1500,
                user_agent: "DriftWatcher/0.3".to_string(),
                chrome_path: None,
            },
            tracker: TrackerConfig {
                threshold: 20.0,
                skills: vec!["python".to_string(), "sql".to_string()],
                skill_bonus: 5.0,
                reference_path: Some("data/reference.txt".to_string()),
            },
            notifications: NotificationsConfig {
                webhook_url: Some("https://hooks.example.com/services/T0/B0/x".to_string()),
                max_alerts_per_run: 10,
            },
            export: ExportConfig {
                path: "exports/listings.json".to_string(),
            },
            targets: vec![
                WatchTarget {
                    name: "Fruits & Vegetables".to_string(),
                    url: "https://shop.example/cn/fruits-vegetables".to_string(),
                    kind: ListingKind::Product,
                },
                WatchTarget {
                    name: "data science".to_string(),
                    url: "https://jobs.example/search?fn=data-science".to_string(),
                    kind: ListingKind::Job,
                },
            ],
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_threshold() {
        let mut config = valid_config();
        config.tracker.threshold = 0.0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("threshold must be greater than 0"));
    }

    #[test]
    fn test_config_validation_invalid_webhook() {
        let mut config = valid_config();
        config.notifications.webhook_url = Some("not-a-url".to_string());

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("webhook URL"));
    }

    #[test]
    fn test_config_validation_invalid_target_url() {
        let mut config = valid_config();
        config.targets[0].url = "nope".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid URL for target"));
    }

    #[test]
    fn test_config_validation_scroll_budget() {
        let mut config = valid_config();
        config.fetcher.max_scroll_rounds = 1;
        config.fetcher.scroll_stability_rounds = 3;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("max_scroll_rounds"));
    }

    #[test]
    fn test_config_validation_job_target_needs_reference() {
        let mut config = valid_config();
        config.tracker.reference_path = None;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("reference_path is required"));
    }

    #[test]
    fn test_config_validation_no_targets_is_ok() {
        let mut config = valid_config();
        config.targets.clear();
        config.tracker.reference_path = None;

        assert!(config.validate().is_ok());
    }
}
