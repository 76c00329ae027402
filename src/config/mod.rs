use std::env;
use std::path::PathBuf;

use crate::errors::AppError;

const DEFAULT_MAX_REPORT_BYTES: u64 = 64 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port_mapper_path: Option<PathBuf>,
    pub max_report_bytes: u64,
    pub log_json: bool,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_mapper_path: None,
            max_report_bytes: DEFAULT_MAX_REPORT_BYTES,
            log_json: false,
            log_filter: "reportnorm=info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            port_mapper_path: env::var("REPORTNORM_PORT_MAPPER")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            max_report_bytes: match env::var("REPORTNORM_MAX_REPORT_BYTES") {
                Ok(raw) => raw.trim().parse().map_err(|_| {
                    AppError::Config(format!("REPORTNORM_MAX_REPORT_BYTES is not a number: {raw}"))
                })?,
                Err(_) => defaults.max_report_bytes,
            },
            log_json: env::var("REPORTNORM_LOG_JSON")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
            log_filter: env::var("REPORTNORM_LOG_FILTER").unwrap_or(defaults.log_filter),
        })
    }
}
