//! 销售记录与汇总文档模型
//!
//! 字段名在存储中使用 camelCase，与前端及报表代码直接读取的文档结构一致。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{Result, SalesRollupError};
use crate::storage::{Document, Fields};

/// 原始销售记录集合
pub const SALES_COLLECTION: &str = "sales";

/// 汇总粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Minute,
    Hour,
    Date,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Minute, Granularity::Hour, Granularity::Date];

    /// 对应的汇总集合名
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Minute => "sales_by_minute",
            Self::Hour => "sales_by_hour",
            Self::Date => "sales_by_date",
        }
    }

    /// 取出该粒度对应的时间键
    pub fn key<'a>(&self, keys: &'a TimeKeys) -> &'a str {
        match self {
            Self::Minute => &keys.minute_key,
            Self::Hour => &keys.hour_key,
            Self::Date => &keys.date_key,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minute => write!(f, "minute"),
            Self::Hour => write!(f, "hour"),
            Self::Date => write!(f, "date"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minute" | "sales_by_minute" => Ok(Self::Minute),
            "hour" | "sales_by_hour" => Ok(Self::Hour),
            "date" | "day" | "sales_by_date" => Ok(Self::Date),
            _ => Err(format!(
                "Invalid granularity: '{}'. Valid: minute, hour, date",
                s
            )),
        }
    }
}

/// 一条销售记录的三级时间键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeKeys {
    /// YYYY-MM-DD
    pub date_key: String,
    /// YYYY-MM-DD-HH
    pub hour_key: String,
    /// YYYY-MM-DD-HH-mm
    pub minute_key: String,
}

impl TimeKeys {
    /// 转为可直接写回销售记录的字段
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("dateKey".to_string(), Value::String(self.date_key.clone()));
        fields.insert("hourKey".to_string(), Value::String(self.hour_key.clone()));
        fields.insert(
            "minuteKey".to_string(),
            Value::String(self.minute_key.clone()),
        );
        fields
    }
}

/// 销售记录（`sales` 集合中的文档）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaleRecord {
    #[serde(skip)]
    pub id: String,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    #[serde(deserialize_with = "lenient_quantity")]
    pub quantity: Option<u64>,
    pub unit_price: Option<f64>,
    pub total_amount: Option<f64>,
    pub store_location: Option<String>,
    pub sale_date_time: Option<Value>,
    pub date_key: Option<String>,
    pub hour_key: Option<String>,
    pub minute_key: Option<String>,
}

impl SaleRecord {
    /// 从存储文档解析
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut sale: SaleRecord = serde_json::from_value(Value::Object(doc.data.clone()))
            .map_err(|e| {
                SalesRollupError::invalid_sale(format!("Sale {} cannot be decoded: {}", doc.id, e))
            })?;
        sale.id = doc.id.clone();
        Ok(sale)
    }

    /// 三个时间键都已存在时返回它们
    pub fn time_keys(&self) -> Option<TimeKeys> {
        let present = |k: &Option<String>| k.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        Some(TimeKeys {
            date_key: present(&self.date_key)?,
            hour_key: present(&self.hour_key)?,
            minute_key: present(&self.minute_key)?,
        })
    }

    /// 生成写入汇总文档的摘要
    pub fn summary(&self) -> SaleSummary {
        SaleSummary {
            id: self.id.clone(),
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            quantity: self.quantity.unwrap_or(0),
            unit_price: self.unit_price,
            total_amount: self.total_amount.unwrap_or(0.0),
            store_location: self.store_location.clone(),
            sale_date_time: self.sale_date_time.clone(),
        }
    }
}

/// 数量字段兼容整数形式的浮点数（如 `2.0`）
fn lenient_quantity<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(q) = n.as_u64() {
                Ok(Some(q))
            } else if let Some(f) = n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0) {
                Ok(Some(f as u64))
            } else {
                Err(D::Error::custom(format!(
                    "quantity must be a non-negative integer, got {}",
                    n
                )))
            }
        }
        Some(other) => Err(D::Error::custom(format!(
            "quantity must be a number, got {}",
            other
        ))),
    }
}

/// 汇总文档中保存的销售摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub store_location: Option<String>,
    #[serde(default)]
    pub sale_date_time: Option<Value>,
}

/// 单个时间桶的汇总文档
///
/// `sales` 以销售 ID 为键保存摘要，用于去重和明细下钻。
/// 不变式：`transaction_count == sales.len()`，`total_amount`、`total_quantity`
/// 分别等于摘要中 `total_amount`、`quantity` 之和。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDocument {
    pub total_amount: f64,
    pub total_quantity: u64,
    pub transaction_count: u64,
    #[serde(default, deserialize_with = "sales_by_id")]
    pub sales: BTreeMap<String, SaleSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 兼容旧版以数组保存的 `sales`
fn sales_by_id<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, SaleSummary>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SalesRepr {
        ById(BTreeMap<String, SaleSummary>),
        List(Vec<SaleSummary>),
    }

    Ok(match Option::<SalesRepr>::deserialize(deserializer)? {
        None => BTreeMap::new(),
        Some(SalesRepr::ById(map)) => map,
        Some(SalesRepr::List(list)) => {
            let listed = list.len();
            let map: BTreeMap<String, SaleSummary> =
                list.into_iter().map(|s| (s.id.clone(), s)).collect();
            if map.len() < listed {
                // 重复 ID 只保留最后一条；计数字段不重算，交给 verify 报告
                warn!(
                    "Legacy sales array has {} duplicate id(s); kept {} of {} summaries",
                    listed - map.len(),
                    map.len(),
                    listed
                );
            }
            map
        }
    })
}

impl AggregateDocument {
    /// 以第一笔销售创建汇总
    pub fn new(summary: SaleSummary, now: DateTime<Utc>) -> Self {
        Self {
            total_amount: summary.total_amount,
            total_quantity: summary.quantity,
            transaction_count: 1,
            sales: BTreeMap::from([(summary.id.clone(), summary)]),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains(&self, sale_id: &str) -> bool {
        self.sales.contains_key(sale_id)
    }

    /// 累加一笔尚未包含的销售；已包含时返回 `Ok(false)` 且不做任何修改
    ///
    /// 累计值溢出时返回 `InvalidSale`，文档保持原样。
    pub fn merge(&mut self, summary: SaleSummary, now: DateTime<Utc>) -> Result<bool> {
        if self.contains(&summary.id) {
            return Ok(false);
        }

        let overflow = |field: &str| {
            SalesRollupError::invalid_sale(format!(
                "Sale {} would overflow {} of the bucket",
                summary.id, field
            ))
        };
        let total_quantity = self
            .total_quantity
            .checked_add(summary.quantity)
            .ok_or_else(|| overflow("totalQuantity"))?;
        let transaction_count = self
            .transaction_count
            .checked_add(1)
            .ok_or_else(|| overflow("transactionCount"))?;
        let total_amount = self.total_amount + summary.total_amount;
        if !total_amount.is_finite() {
            return Err(overflow("totalAmount"));
        }

        self.total_amount = total_amount;
        self.total_quantity = total_quantity;
        self.transaction_count = transaction_count;
        self.updated_at = now;
        self.sales.insert(summary.id.clone(), summary);
        Ok(true)
    }

    /// 检查汇总值与明细是否一致，返回发现的问题
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let count = self.sales.len() as u64;
        if self.transaction_count != count {
            problems.push(format!(
                "transactionCount {} != {} sale summaries",
                self.transaction_count, count
            ));
        }

        let quantity = self
            .sales
            .values()
            .try_fold(0u64, |acc, s| acc.checked_add(s.quantity));
        match quantity {
            Some(quantity) if quantity == self.total_quantity => {}
            Some(quantity) => problems.push(format!(
                "totalQuantity {} != sum of quantities {}",
                self.total_quantity, quantity
            )),
            None => problems.push("sum of quantities overflows u64".to_string()),
        }

        let amount: f64 = self.sales.values().map(|s| s.total_amount).sum();
        if (self.total_amount - amount).abs() > 1e-6 {
            problems.push(format!(
                "totalAmount {} != sum of amounts {}",
                self.total_amount, amount
            ));
        }

        problems
    }

    pub fn from_fields(fields: &Fields) -> Result<Self> {
        serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
            SalesRollupError::serialization(format!("Malformed aggregate document: {}", e))
        })
    }

    pub fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(SalesRollupError::serialization(
                "Aggregate document did not serialize to an object",
            )),
        }
    }
}

/// 单次汇总写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationResult {
    /// 时间桶文档不存在，已创建
    Created,
    /// 已累加到现有时间桶
    Updated,
    /// 该销售已包含在时间桶中，未做修改
    Skipped,
}

impl AggregationResult {
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}
