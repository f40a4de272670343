//! Configuration file loading
//!
//! A configuration path of `-` reads JSON from stdin. Otherwise the format
//! follows the file extension: `.toml` is TOML, anything else is JSON.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use bucket_policy_compiler_core::BucketSecurityConfig;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

pub fn load(path: &Path) -> Result<BucketSecurityConfig> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read configuration from stdin")?;
        return parse(&text, ConfigFormat::Json).context("invalid configuration on stdin");
    }

    let format = ConfigFormat::from_path(path);
    debug!("Loading {:?} configuration from {}", format, path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    parse(&text, format).with_context(|| format!("invalid configuration file {}", path.display()))
}

pub fn parse(text: &str, format: ConfigFormat) -> Result<BucketSecurityConfig> {
    let config = match format {
        ConfigFormat::Json => serde_json::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("bucket.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("bucket.TOML")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("bucket.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("bucket")), ConfigFormat::Json);
    }

    #[test]
    fn test_parse_toml() {
        let config = parse(
            r#"
name = "audit-logs"
environment = "prod"
kms_key_id = "1234abcd-12ab-34cd-56ef-1234567890ab"
trusted_principals = ["arn:aws:iam::111122223333:role/A"]

[[lifecycle_rules]]
id = "archive"
transitions = [{ after_days = 30, storage_class = "GLACIER" }]
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.name, "audit-logs");
        assert_eq!(config.partition, "aws");
        assert_eq!(config.lifecycle_rules[0].transitions[0].after_days, 30);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = parse(
            r#"{"name": "a-b", "environment": "prod", "encryption": true}"#,
            ConfigFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("encryption"), "error was: {}", err);
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{not json").unwrap();

        let err = load(file.path()).unwrap_err();
        assert!(
            format!("{:#}", err).contains(&file.path().display().to_string()),
            "error was: {:#}",
            err
        );
    }
}
