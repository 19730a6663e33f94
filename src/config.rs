//! Runtime configuration, read from the environment (and `.env` when present).

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected \"pretty\" or \"json\", got {other:?}")),
        }
    }
}

/// Settings for the external OCR executable.
///
/// Only the executable path comes from the environment. The language and
/// the engine/segmentation modes are fixed.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub command: PathBuf,
    pub language: String,
    /// `--oem`: 1 selects the LSTM engine.
    pub engine_mode: u8,
    /// `--psm`: 6 assumes a single uniform block of text.
    pub page_segmentation: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            command: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            engine_mode: 1,
            page_segmentation: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub upload_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
    pub ocr: OcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
            upload_dir: PathBuf::from("./uploads"),
            artifact_dir: env::temp_dir(),
            max_upload_bytes: 50 * 1024 * 1024,
            log_format: LogFormat::Pretty,
            ocr: OcrConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let workers = match lookup("SERVER_WORKERS") {
            Some(value) => Some(parse("SERVER_WORKERS", value)?),
            None => None,
        };
        if workers == Some(0) {
            return Err(ConfigError::Invalid {
                key: "SERVER_WORKERS",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        Ok(Config {
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_or("SERVER_PORT", &lookup, defaults.port)?,
            workers,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            artifact_dir: lookup("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", &lookup, defaults.max_upload_bytes)?,
            log_format: parse_or("LOG_FORMAT", &lookup, defaults.log_format)?,
            ocr: OcrConfig {
                command: lookup("TESSERACT_CMD")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ocr.command),
                ..defaults.ocr
            },
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => parse(key, value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, None);
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.ocr.command, PathBuf::from("tesseract"));
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.engine_mode, 1);
        assert_eq!(config.ocr.page_segmentation, 6);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("SERVER_WORKERS", "2"),
            ("UPLOAD_DIR", "/tmp/in"),
            ("ARTIFACT_DIR", "/tmp/out"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("LOG_FORMAT", "JSON"),
            ("TESSERACT_CMD", "/opt/tesseract/bin/tesseract"),
        ])
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/in"));
        assert_eq!(config.artifact_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.ocr.command,
            PathBuf::from("/opt/tesseract/bin/tesseract")
        );
        assert_eq!(config.ocr.language, "eng");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("SERVER_PORT", "eighty")]).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "SERVER_PORT");
                assert_eq!(value, "eighty");
            }
        }
    }

    #[test]
    fn test_invalid_log_format_and_zero_workers() {
        assert!(config_from(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(config_from(&[("SERVER_WORKERS", "0")]).is_err());
    }
}
