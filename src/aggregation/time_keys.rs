//! 时间键推导
//!
//! 将销售时间映射为 `YYYY-MM-DD` / `YYYY-MM-DD-HH` / `YYYY-MM-DD-HH-mm`
//! 三级键，全部在同一个配置时区下计算。

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::errors::{Result, SalesRollupError};
use crate::models::TimeKeys;
use crate::storage::Fields;

/// 不带时区的日期时间格式，按配置时区的本地时间解释
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// 从某个时间戳字段推导出的结果
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedKeys {
    /// 实际使用的字段名
    pub field: String,
    /// 解析出的时刻
    pub timestamp: DateTime<Utc>,
    pub keys: TimeKeys,
}

/// 时间键推导器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeKeyDeriver {
    tz: Tz,
}

impl Default for TimeKeyDeriver {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl TimeKeyDeriver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// 按 IANA 时区名构建，例如 `Asia/Shanghai`
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| SalesRollupError::config(format!("Unknown time zone: '{}'", name)))
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// 推导某一时刻的三级时间键
    pub fn derive(&self, instant: DateTime<Utc>) -> TimeKeys {
        let local = instant.with_timezone(&self.tz);
        TimeKeys {
            date_key: local.format("%Y-%m-%d").to_string(),
            hour_key: local.format("%Y-%m-%d-%H").to_string(),
            minute_key: local.format("%Y-%m-%d-%H-%M").to_string(),
        }
    }

    /// 解析时间戳值后推导时间键
    pub fn derive_value(&self, value: &Value) -> Result<TimeKeys> {
        Ok(self.derive(self.parse_timestamp(value)?))
    }

    /// 按字段优先级推导：依次尝试 `fields` 中每个存在且可解析的字段
    pub fn derive_from_fields(&self, data: &Fields, fields: &[String]) -> Result<DerivedKeys> {
        let mut tried = Vec::new();

        for field in fields {
            let Some(value) = data.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            match self.parse_timestamp(value) {
                Ok(timestamp) => {
                    return Ok(DerivedKeys {
                        field: field.clone(),
                        timestamp,
                        keys: self.derive(timestamp),
                    });
                }
                Err(e) => tried.push(format!("{} ({})", field, e.message())),
            }
        }

        if tried.is_empty() {
            Err(SalesRollupError::invalid_timestamp(format!(
                "No timestamp field present (looked for: {})",
                fields.join(", ")
            )))
        } else {
            Err(SalesRollupError::invalid_timestamp(format!(
                "No parsable timestamp field: {}",
                tried.join("; ")
            )))
        }
    }

    /// 将各种时间戳表示解析为 UTC 时刻
    ///
    /// 支持：RFC 3339 / RFC 2822 字符串、无时区的日期时间或日期字符串（按配置时区解释）、
    /// 毫秒时间戳数字、`{seconds, nanoseconds}` 形式的存储原生时间戳对象。
    pub fn parse_timestamp(&self, value: &Value) -> Result<DateTime<Utc>> {
        match value {
            Value::String(s) => self.parse_str(s.trim()),
            Value::Number(n) => {
                let millis = n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                    .ok_or_else(|| {
                        SalesRollupError::invalid_timestamp(format!("Invalid epoch value: {}", n))
                    })?;
                DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    SalesRollupError::invalid_timestamp(format!(
                        "Epoch milliseconds out of range: {}",
                        millis
                    ))
                })
            }
            Value::Object(obj) => {
                let seconds = obj
                    .get("seconds")
                    .or_else(|| obj.get("_seconds"))
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        SalesRollupError::invalid_timestamp(
                            "Timestamp object has no integer 'seconds' field",
                        )
                    })?;
                let nanos = obj
                    .get("nanoseconds")
                    .or_else(|| obj.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                u32::try_from(nanos)
                    .ok()
                    .and_then(|nanos| DateTime::from_timestamp(seconds, nanos))
                    .ok_or_else(|| {
                        SalesRollupError::invalid_timestamp(format!(
                            "Timestamp out of range: {}s {}ns",
                            seconds, nanos
                        ))
                    })
            }
            Value::Null => Err(SalesRollupError::invalid_timestamp("Timestamp is null")),
            other => Err(SalesRollupError::invalid_timestamp(format!(
                "Unsupported timestamp value: {}",
                other
            ))),
        }
    }

    fn parse_str(&self, s: &str) -> Result<DateTime<Utc>> {
        if s.is_empty() {
            return Err(SalesRollupError::invalid_timestamp("Timestamp is empty"));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in NAIVE_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return self.localize(naive, s);
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
        {
            return self.localize(midnight, s);
        }

        Err(SalesRollupError::invalid_timestamp(format!(
            "Unparsable timestamp: '{}'",
            s
        )))
    }

    /// 本地时间转为时刻；夏令时重叠取较早者，跳过的时间视为无效
    fn localize(&self, naive: NaiveDateTime, raw: &str) -> Result<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                SalesRollupError::invalid_timestamp(format!(
                    "Local time '{}' does not exist in time zone {}",
                    raw,
                    self.tz.name()
                ))
            })
    }
}
