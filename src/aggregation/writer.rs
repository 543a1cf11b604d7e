//! 汇总写入器
//!
//! 将一笔销售以事务方式合并进某个粒度的一个时间桶文档。
//! 同一笔销售重复写入同一时间桶不会重复计数。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::errors::{Result, SalesRollupError};
use crate::models::{AggregateDocument, AggregationResult, Granularity, SaleRecord, TimeKeys};
use crate::storage::{DocumentStore, TxDecision, run_transaction};

/// 汇总写入器
///
/// 汇总文档只由此处修改。冲突重试完全交给 [`run_transaction`]。
#[derive(Clone)]
pub struct AggregationWriter {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl AggregationWriter {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// 将 `sale` 合并进 `granularity` 粒度下键为 `bucket_key` 的时间桶
    ///
    /// - 时间桶不存在：以该销售创建，返回 `Created`
    /// - 时间桶已包含该销售：不做修改，返回 `Skipped`
    /// - 否则：累加金额、数量、笔数并追加摘要，返回 `Updated`
    pub async fn upsert_aggregate(
        &self,
        granularity: Granularity,
        bucket_key: &str,
        sale: &SaleRecord,
    ) -> Result<AggregationResult> {
        let collection = granularity.collection();

        if bucket_key.trim().is_empty() {
            return Err(SalesRollupError::missing_time_key(format!(
                "Empty {} key for sale '{}'",
                granularity, sale.id
            )));
        }
        if sale.id.is_empty() {
            return Err(SalesRollupError::invalid_sale(format!(
                "Sale without id cannot be aggregated into {}/{}",
                collection, bucket_key
            )));
        }

        let summary = sale.summary();

        let result = run_transaction(
            self.store.as_ref(),
            collection,
            bucket_key,
            self.max_attempts,
            |current| {
                let now = Utc::now();
                let Some(doc) = current else {
                    let aggregate = AggregateDocument::new(summary.clone(), now);
                    return Ok(TxDecision::Write(
                        aggregate.to_fields()?,
                        AggregationResult::Created,
                    ));
                };

                let mut aggregate = AggregateDocument::from_fields(&doc.data)?;
                if !aggregate.merge(summary.clone(), now)? {
                    return Ok(TxDecision::Abort(AggregationResult::Skipped));
                }
                Ok(TxDecision::Write(
                    aggregate.to_fields()?,
                    AggregationResult::Updated,
                ))
            },
        )
        .await?;

        match result {
            AggregationResult::Skipped => trace!(
                "Sale {} already in {}/{}, skipped",
                sale.id, collection, bucket_key
            ),
            _ => debug!(
                "Sale {} merged into {}/{} ({:?})",
                sale.id, collection, bucket_key, result
            ),
        }

        Ok(result)
    }

    /// 依次写入分钟、小时、日期三个粒度
    ///
    /// 任一粒度失败立即返回错误；已成功的粒度不会回滚，重跑时会被去重跳过。
    pub async fn upsert_all(
        &self,
        keys: &TimeKeys,
        sale: &SaleRecord,
    ) -> Result<[AggregationResult; 3]> {
        let mut results = [AggregationResult::Skipped; 3];
        for (slot, granularity) in results.iter_mut().zip(Granularity::ALL) {
            *slot = self
                .upsert_aggregate(granularity, granularity.key(keys), sale)
                .await?;
        }
        Ok(results)
    }
}
