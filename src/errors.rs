use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SalesRollupError {
    InvalidTimestamp(String),
    MissingTimeKey(String),
    Store(String),
    InvalidSale(String),
    NotFound(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    Serialization(String),
    Config(String),
}

impl SalesRollupError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SalesRollupError::InvalidTimestamp(_) => "E001",
            SalesRollupError::MissingTimeKey(_) => "E002",
            SalesRollupError::Store(_) => "E003",
            SalesRollupError::InvalidSale(_) => "E004",
            SalesRollupError::NotFound(_) => "E005",
            SalesRollupError::DatabaseConfig(_) => "E006",
            SalesRollupError::DatabaseConnection(_) => "E007",
            SalesRollupError::Serialization(_) => "E008",
            SalesRollupError::Config(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SalesRollupError::InvalidTimestamp(_) => "Invalid Timestamp",
            SalesRollupError::MissingTimeKey(_) => "Missing Time Key",
            SalesRollupError::Store(_) => "Store Error",
            SalesRollupError::InvalidSale(_) => "Invalid Sale Record",
            SalesRollupError::NotFound(_) => "Document Not Found",
            SalesRollupError::DatabaseConfig(_) => "Database Configuration Error",
            SalesRollupError::DatabaseConnection(_) => "Database Connection Error",
            SalesRollupError::Serialization(_) => "Serialization Error",
            SalesRollupError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SalesRollupError::InvalidTimestamp(msg) => msg,
            SalesRollupError::MissingTimeKey(msg) => msg,
            SalesRollupError::Store(msg) => msg,
            SalesRollupError::InvalidSale(msg) => msg,
            SalesRollupError::NotFound(msg) => msg,
            SalesRollupError::DatabaseConfig(msg) => msg,
            SalesRollupError::DatabaseConnection(msg) => msg,
            SalesRollupError::Serialization(msg) => msg,
            SalesRollupError::Config(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于日志）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SalesRollupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SalesRollupError {}

// 便捷的构造函数
impl SalesRollupError {
    pub fn invalid_timestamp<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::InvalidTimestamp(msg.into())
    }

    pub fn missing_time_key<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::MissingTimeKey(msg.into())
    }

    pub fn store<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::Store(msg.into())
    }

    pub fn invalid_sale<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::InvalidSale(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::NotFound(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::DatabaseConnection(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::Serialization(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        SalesRollupError::Config(msg.into())
    }
}

impl From<sea_orm::DbErr> for SalesRollupError {
    fn from(err: sea_orm::DbErr) -> Self {
        SalesRollupError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for SalesRollupError {
    fn from(err: serde_json::Error) -> Self {
        SalesRollupError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for SalesRollupError {
    fn from(err: chrono::ParseError) -> Self {
        SalesRollupError::InvalidTimestamp(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SalesRollupError>;
