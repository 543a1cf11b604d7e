//! Configuration loading tests

use sales_rollup::config::StaticConfig;
use sales_rollup::errors::SalesRollupError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[cfg(test)]
mod load_tests {
    use super::*;

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let config = StaticConfig::load(None).unwrap();
        assert_eq!(config.aggregation.time_zone, "UTC");
        assert_eq!(config.aggregation.max_transaction_attempts, 5);
        assert_eq!(config.database.database_url, "sales.db");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_config(
            r#"
[database]
database_url = "sqlite://rollups.db"

[aggregation]
time_zone = "Asia/Shanghai"
chunk_size = 50
timestamp_fields = ["saleDateTime", "legacyTime"]
"#,
        );

        let config = StaticConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.database.database_url, "sqlite://rollups.db");
        assert_eq!(config.aggregation.time_zone, "Asia/Shanghai");
        assert_eq!(config.aggregation.chunk_size, 50);
        assert_eq!(
            config.aggregation.timestamp_fields,
            vec!["saleDateTime".to_string(), "legacyTime".to_string()]
        );
        // 未配置的项保持默认值
        assert_eq!(config.aggregation.progress_interval, 100);
        assert_eq!(config.logging.level, "info");
        assert!(config.aggregation.validate().is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = StaticConfig::load(Some("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, SalesRollupError::Config(_)));
    }

    #[test]
    fn test_malformed_value_is_error_not_defaults() {
        let file = write_config(
            r#"
[aggregation]
time_zone = "Asia/Shanghai"
chunk_size = "lots"
"#,
        );

        let err = StaticConfig::load(file.path().to_str()).unwrap_err();
        assert!(matches!(err, SalesRollupError::Config(_)));
        assert_eq!(err.code(), "E009");
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_config("[aggregation\ntime_zone = ");
        assert!(StaticConfig::load(file.path().to_str()).is_err());
    }
}
