//! Configuration module
//!
//! This module provides the configuration structures for the HTTP server and
//! the batch pipeline. Everything is read once from the environment at startup
//! and then passed explicitly to the components that need it.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

// Common constants
const SERVER_PORT: u16 = 5000;
const MAX_UPLOAD_SIZE_MB: usize = 500;
const SCALE_FACTOR: f32 = 4.0;
const MAX_SCALE_FACTOR: f32 = 16.0;
const OUTPUT_QUALITY: u8 = 95;
const ITEM_CONCURRENCY: usize = 1;
const MAX_ARCHIVE_ENTRIES: usize = 10_000;
const MAX_EXTRACTED_SIZE_MB: u64 = 2048;
const MAX_OUTPUT_PIXELS: u64 = 100_000_000;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const HTTP_CONCURRENCY_LIMIT: usize = 64;
const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,webp,bmp,tiff,tif";
const DEFAULT_CORS_ORIGINS: &str = "*,null";

/// Server-level settings that have nothing to do with image processing
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub request_timeout_secs: u64,
    pub http_concurrency_limit: usize,
    /// `json` switches the log output to JSON lines
    pub log_format: String,
}

/// Settings handed to every Job at creation.
///
/// This replaces any process-wide default: the pipeline never reads the
/// environment itself.
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub scale_factor: f32,
    pub allowed_extensions: Vec<String>,
    /// JPEG quality, 1..=100
    pub output_quality: u8,
    /// Per-Job worker ceiling. 1 processes items one at a time.
    pub item_concurrency: usize,
    pub workspace_root: PathBuf,
    pub max_archive_entries: usize,
    pub max_extracted_bytes: u64,
    pub max_output_pixels: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            scale_factor: SCALE_FACTOR,
            allowed_extensions: split_list(DEFAULT_EXTENSIONS),
            output_quality: OUTPUT_QUALITY,
            item_concurrency: ITEM_CONCURRENCY,
            workspace_root: env::temp_dir().join("rescale"),
            max_archive_entries: MAX_ARCHIVE_ENTRIES,
            max_extracted_bytes: MAX_EXTRACTED_SIZE_MB * 1024 * 1024,
            max_output_pixels: MAX_OUTPUT_PIXELS,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.scale_factor.is_finite()
            || self.scale_factor <= 0.0
            || self.scale_factor > MAX_SCALE_FACTOR
        {
            return Err(anyhow::anyhow!(
                "SCALE_FACTOR must be greater than 0 and at most {}, got {}",
                MAX_SCALE_FACTOR,
                self.scale_factor
            ));
        }
        if !(1..=100).contains(&self.output_quality) {
            return Err(anyhow::anyhow!(
                "OUTPUT_QUALITY must be between 1 and 100, got {}",
                self.output_quality
            ));
        }
        if self.item_concurrency == 0 {
            return Err(anyhow::anyhow!("ITEM_CONCURRENCY must be at least 1"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }
        if self.max_archive_entries == 0 || self.max_extracted_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_ARCHIVE_ENTRIES and MAX_EXTRACTED_SIZE_MB must be greater than 0"
            ));
        }
        if self.max_output_pixels == 0 {
            return Err(anyhow::anyhow!("MAX_OUTPUT_PIXELS must be greater than 0"));
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub max_upload_size_bytes: usize,
    pub processing: ProcessingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str =
            lookup("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());
        if is_production_environment(&environment) && cors_origins_str.split(',').any(|o| o.trim() == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: match lookup("PORT") {
                Some(port) => port
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                None => SERVER_PORT,
            },
            cors_origins: split_list(&cors_origins_str),
            environment,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)
                .max(1),
            http_concurrency_limit: parse_or(
                &lookup,
                "HTTP_CONCURRENCY_LIMIT",
                HTTP_CONCURRENCY_LIMIT,
            )
            .max(1),
            log_format: lookup("LOG_FORMAT")
                .unwrap_or_else(|| "text".to_string())
                .to_lowercase(),
        };

        let defaults = ProcessingConfig::default();
        let processing = ProcessingConfig {
            scale_factor: parse_or(&lookup, "SCALE_FACTOR", defaults.scale_factor),
            allowed_extensions: lookup("ALLOWED_EXTENSIONS")
                .map(|s| split_list(&s.to_lowercase()))
                .unwrap_or(defaults.allowed_extensions),
            output_quality: parse_or(&lookup, "OUTPUT_QUALITY", defaults.output_quality),
            item_concurrency: parse_or(&lookup, "ITEM_CONCURRENCY", defaults.item_concurrency),
            workspace_root: lookup("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            max_archive_entries: parse_or(
                &lookup,
                "MAX_ARCHIVE_ENTRIES",
                defaults.max_archive_entries,
            ),
            max_extracted_bytes: parse_or(&lookup, "MAX_EXTRACTED_SIZE_MB", MAX_EXTRACTED_SIZE_MB)
                .saturating_mul(1024 * 1024),
            max_output_pixels: parse_or(&lookup, "MAX_OUTPUT_PIXELS", defaults.max_output_pixels),
        };

        let max_upload_size_mb: usize = parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        Ok(Config {
            base,
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            processing,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        self.processing.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_bytes
    }

    pub fn processing(&self) -> &ProcessingConfig {
        &self.processing
    }
}

/// `production` or `prod`, any case
pub fn is_production_environment(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.server_port(), 5000);
        assert_eq!(config.max_upload_size_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.processing.scale_factor, 4.0);
        assert_eq!(config.processing.output_quality, 95);
        assert_eq!(config.processing.item_concurrency, 1);
        assert_eq!(
            config.processing.allowed_extensions,
            vec!["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"]
        );
        assert_eq!(config.cors_origins(), &["*".to_string(), "null".to_string()]);
        assert!(!config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("SCALE_FACTOR", "2.5"),
            ("ALLOWED_EXTENSIONS", "PNG, .Jpg"),
            ("OUTPUT_QUALITY", "80"),
            ("ITEM_CONCURRENCY", "4"),
            ("MAX_UPLOAD_SIZE_MB", "10"),
            ("WORKSPACE_ROOT", "/srv/rescale"),
        ]))
        .unwrap();

        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.processing.scale_factor, 2.5);
        assert_eq!(config.processing.allowed_extensions, vec!["png", "jpg"]);
        assert_eq!(config.processing.output_quality, 80);
        assert_eq!(config.processing.item_concurrency, 4);
        assert_eq!(config.max_upload_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(
            config.processing.workspace_root,
            PathBuf::from("/srv/rescale")
        );
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SCALE_FACTOR", "big"),
            ("OUTPUT_QUALITY", "-3"),
        ]))
        .unwrap();

        assert_eq!(config.processing.scale_factor, 4.0);
        assert_eq!(config.processing.output_quality, 95);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let result = Config::from_lookup(lookup_from(&[("ENVIRONMENT", "production")]));
        assert!(result.is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "prod"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ]))
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_production_environment_names() {
        assert!(is_production_environment("production"));
        assert!(is_production_environment("PROD"));
        assert!(!is_production_environment("staging"));
        assert!(!is_production_environment(""));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut processing = ProcessingConfig::default();
        processing.scale_factor = 0.0;
        assert!(processing.validate().is_err());

        let mut processing = ProcessingConfig::default();
        processing.scale_factor = 64.0;
        assert!(processing.validate().is_err());

        let mut processing = ProcessingConfig::default();
        processing.output_quality = 0;
        assert!(processing.validate().is_err());

        let mut processing = ProcessingConfig::default();
        processing.item_concurrency = 0;
        assert!(processing.validate().is_err());

        let mut processing = ProcessingConfig::default();
        processing.allowed_extensions.clear();
        assert!(processing.validate().is_err());
    }
}
