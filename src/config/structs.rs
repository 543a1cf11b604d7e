use serde::{Deserialize, Serialize};

use crate::errors::{Result, SalesRollupError};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - database: 数据库连接与重试配置
/// - logging: 日志配置
/// - aggregation: 汇总引擎配置（时区、分块大小、事务重试次数等）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：SR，分隔符：__
    /// 示例：SR__AGGREGATION__TIME_ZONE=Asia/Shanghai
    ///
    /// 未指定 `path` 时默认文件可以不存在；显式指定的文件必须存在。
    /// 文件无法解析或取值类型不符时返回 `Config` 错误，不会回退到默认值。
    pub fn load(path: Option<&str>) -> Result<Self> {
        use config::{Config, Environment, File};

        let explicit = path.is_some();
        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let settings = Config::builder()
            // 1. 从 TOML 文件加载
            .add_source(File::with_name(path).required(explicit))
            // 2. 从环境变量覆盖，前缀 SR，分隔符 __
            .add_source(
                Environment::with_prefix("SR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("aggregation.timestamp_fields")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                SalesRollupError::config(format!("Failed to read config '{}': {}", path, e))
            })?;

        let config = settings.try_deserialize::<StaticConfig>().map_err(|e| {
            SalesRollupError::config(format!("Invalid config '{}': {}", path, e))
        })?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 汇总引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// IANA 时区名，所有时间键均在此时区下计算
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// 回填时每次读取的销售记录数量
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// 每处理多少条记录输出一次进度日志
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// 单个汇总文档事务的最大尝试次数（含首次）
    #[serde(default = "default_max_transaction_attempts")]
    pub max_transaction_attempts: u32,
    /// 每个分块内并发处理的记录数，1 表示顺序处理
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 推导时间键时按顺序尝试的时间戳字段（第一个为规范字段，其余为历史字段名）
    #[serde(default = "default_timestamp_fields")]
    pub timestamp_fields: Vec<String>,
}

impl AggregationConfig {
    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        if self.time_zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(SalesRollupError::config(format!(
                "Unknown time zone: '{}'",
                self.time_zone
            )));
        }
        if self.chunk_size == 0 {
            return Err(SalesRollupError::config("chunk_size must be greater than 0"));
        }
        if self.max_transaction_attempts == 0 {
            return Err(SalesRollupError::config(
                "max_transaction_attempts must be greater than 0",
            ));
        }
        if self.timestamp_fields.is_empty() {
            return Err(SalesRollupError::config(
                "timestamp_fields must name at least one field",
            ));
        }
        Ok(())
    }
}

// ============================================================
// Default value functions
// ============================================================

fn default_database_url() -> String {
    "sales.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_chunk_size() -> u64 {
    500
}

fn default_progress_interval() -> u64 {
    100
}

fn default_max_transaction_attempts() -> u32 {
    5
}

fn default_concurrency() -> usize {
    1
}

fn default_timestamp_fields() -> Vec<String> {
    ["saleDateTime", "saleDate", "timestamp", "createdAt", "date"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================
// Default implementations
// ============================================================

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            chunk_size: default_chunk_size(),
            progress_interval: default_progress_interval(),
            max_transaction_attempts: default_max_transaction_attempts(),
            concurrency: default_concurrency(),
            timestamp_fields: default_timestamp_fields(),
        }
    }
}
