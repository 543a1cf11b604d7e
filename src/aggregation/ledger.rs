//! 实时销售入账
//!
//! 新销售写入 `sales` 时直接带上时间键，随后立即汇总到三个粒度。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{AggregationWriter, TimeKeyDeriver};
use crate::errors::{Result, SalesRollupError};
use crate::models::{AggregationResult, SALES_COLLECTION, SaleRecord, TimeKeys};
use crate::storage::{DocumentStore, Fields};

/// 一笔待入账的销售
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub unit_price: f64,
    /// 不会与 quantity × unit_price 校验
    pub total_amount: f64,
    #[serde(default)]
    pub store_location: Option<String>,
    pub sale_date_time: DateTime<Utc>,
}

impl NewSale {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("unitPrice", self.unit_price),
            ("totalAmount", self.total_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SalesRollupError::invalid_sale(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// 入账结果
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSale {
    /// 存储分配的销售 ID
    pub id: String,
    pub keys: TimeKeys,
    /// 分钟、小时、日期三个粒度的写入结果
    pub results: [AggregationResult; 3],
}

/// 销售入账
pub struct SalesLedger {
    store: Arc<dyn DocumentStore>,
    writer: AggregationWriter,
    deriver: TimeKeyDeriver,
}

impl SalesLedger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        writer: AggregationWriter,
        deriver: TimeKeyDeriver,
    ) -> Self {
        Self {
            store,
            writer,
            deriver,
        }
    }

    /// 写入一笔新销售并汇总
    ///
    /// 销售文档创建后若汇总失败，错误会返回给调用方；
    /// 该记录已带有时间键，下一次回填会补齐缺失的时间桶。
    pub async fn record_sale(&self, sale: &NewSale) -> Result<RecordedSale> {
        sale.validate()?;

        let keys = self.deriver.derive(sale.sale_date_time);

        let mut data: Fields = match serde_json::to_value(sale)? {
            Value::Object(fields) => fields,
            _ => return Err(SalesRollupError::serialization("Sale did not serialize to an object")),
        };
        data.extend(keys.to_fields());
        let sale_date_time = data.get("saleDateTime").cloned();

        let id = self.store.create_document(SALES_COLLECTION, data).await?;

        let record = SaleRecord {
            id: id.clone(),
            product_id: Some(sale.product_id.clone()),
            product_name: Some(sale.product_name.clone()),
            quantity: Some(sale.quantity),
            unit_price: Some(sale.unit_price),
            total_amount: Some(sale.total_amount),
            store_location: sale.store_location.clone(),
            sale_date_time,
            date_key: Some(keys.date_key.clone()),
            hour_key: Some(keys.hour_key.clone()),
            minute_key: Some(keys.minute_key.clone()),
        };

        let results = self.writer.upsert_all(&keys, &record).await?;

        info!(
            "Sale {} recorded: {} x {} = {} (bucket {})",
            id, sale.quantity, sale.product_name, sale.total_amount, keys.minute_key
        );

        Ok(RecordedSale { id, keys, results })
    }
}
