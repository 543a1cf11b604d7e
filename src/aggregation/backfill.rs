//! 历史销售回填
//!
//! 分块扫描 `sales` 集合：补齐缺失的时间键并写回记录，
//! 然后按三个粒度调用汇总写入器。单条记录失败只计数并记录日志，不中断整体运行。

use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{AggregationWriter, TimeKeyDeriver};
use crate::config::AggregationConfig;
use crate::errors::{Result, SalesRollupError};
use crate::models::{Granularity, SALES_COLLECTION, SaleRecord, TimeKeys};
use crate::storage::{Document, DocumentStore};

/// 回填参数
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub chunk_size: u64,
    pub progress_interval: u64,
    pub concurrency: usize,
    pub timestamp_fields: Vec<String>,
}

impl From<&AggregationConfig> for BackfillOptions {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            progress_interval: config.progress_interval,
            concurrency: config.concurrency,
            timestamp_fields: config.timestamp_fields.clone(),
        }
    }
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self::from(&AggregationConfig::default())
    }
}

/// 回填统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// 已访问的记录数
    pub processed: u64,
    /// 至少写入了一个时间桶的记录数
    pub succeeded: u64,
    /// 三个时间桶均已包含、无需写入的记录数
    pub skipped: u64,
    /// 失败的记录数
    pub failed: u64,
}

impl BackfillReport {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Aggregated => self.succeeded += 1,
            RecordOutcome::AlreadyAggregated => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// 单条记录失败的原因
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFailure {
    /// 记录无法解析
    Decode(SalesRollupError),
    /// 无可用时间戳，无法推导时间键
    DeriveFailed(SalesRollupError),
    /// 时间键写回失败
    PersistKeys(SalesRollupError),
    /// 某个粒度的汇总写入失败
    Aggregate {
        granularity: Granularity,
        error: SalesRollupError,
    },
}

/// 单条记录的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Aggregated,
    AlreadyAggregated,
    Failed(RecordFailure),
}

/// 回填编排器
pub struct BackfillOrchestrator {
    store: Arc<dyn DocumentStore>,
    writer: AggregationWriter,
    deriver: TimeKeyDeriver,
    options: BackfillOptions,
}

impl BackfillOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        writer: AggregationWriter,
        deriver: TimeKeyDeriver,
        options: BackfillOptions,
    ) -> Self {
        Self {
            store,
            writer,
            deriver,
            options,
        }
    }

    /// 按汇总配置构建（校验时区等配置项）
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &AggregationConfig) -> Result<Self> {
        config.validate()?;
        let deriver = TimeKeyDeriver::from_name(&config.time_zone)?;
        let writer = AggregationWriter::new(store.clone(), config.max_transaction_attempts);
        Ok(Self::new(store, writer, deriver, BackfillOptions::from(config)))
    }

    /// 扫描全部销售记录并回填汇总
    ///
    /// 只有读取销售记录分页失败才返回错误；单条记录的失败体现在报告的 `failed` 中。
    pub async fn run_backfill(&self) -> Result<BackfillReport> {
        let chunk_size = self.options.chunk_size.max(1);
        let concurrency = self.options.concurrency.max(1);
        let progress_interval = self.options.progress_interval;

        info!(
            "Backfill started (backend: {}, chunk size: {}, concurrency: {}, time zone: {})",
            self.store.backend_name(),
            chunk_size,
            concurrency,
            self.deriver.time_zone().name()
        );

        let mut report = BackfillReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let chunk = self
                .store
                .list_documents(SALES_COLLECTION, cursor.as_deref(), chunk_size)
                .await
                .inspect_err(|e| error!("Failed to read sales after {:?}: {}", cursor, e))?;

            let Some(last) = chunk.last() else {
                break;
            };
            cursor = Some(last.id.clone());
            let chunk_len = chunk.len() as u64;

            let mut outcomes = stream::iter(chunk.iter())
                .map(|doc| self.process_record(doc))
                .buffer_unordered(concurrency);

            while let Some(outcome) = outcomes.next().await {
                report.record(&outcome);
                if progress_interval > 0 && report.processed % progress_interval == 0 {
                    info!(
                        "Backfill progress: {} processed ({} succeeded, {} skipped, {} failed)",
                        report.processed, report.succeeded, report.skipped, report.failed
                    );
                }
            }

            if chunk_len < chunk_size {
                break;
            }
        }

        info!(
            "Backfill completed: {} processed, {} succeeded, {} skipped, {} failed",
            report.processed, report.succeeded, report.skipped, report.failed
        );
        Ok(report)
    }

    /// 处理单条销售记录
    pub async fn process_record(&self, doc: &Document) -> RecordOutcome {
        let mut sale = match SaleRecord::from_document(doc) {
            Ok(sale) => sale,
            Err(e) => {
                error!("Sale {} skipped: {}", doc.id, e);
                return RecordOutcome::Failed(RecordFailure::Decode(e));
            }
        };

        let keys = match sale.time_keys() {
            Some(keys) => keys,
            None => match self.populate_keys(doc, &mut sale).await {
                Ok(keys) => keys,
                Err(failure) => return RecordOutcome::Failed(failure),
            },
        };

        let mut wrote_any = false;
        for granularity in Granularity::ALL {
            match self
                .writer
                .upsert_aggregate(granularity, granularity.key(&keys), &sale)
                .await
            {
                Ok(result) => wrote_any |= result.is_write(),
                Err(e) => {
                    error!(
                        "Sale {} failed to aggregate into {}: {}",
                        sale.id,
                        granularity.collection(),
                        e
                    );
                    return RecordOutcome::Failed(RecordFailure::Aggregate {
                        granularity,
                        error: e,
                    });
                }
            }
        }

        if wrote_any {
            RecordOutcome::Aggregated
        } else {
            RecordOutcome::AlreadyAggregated
        }
    }

    /// 推导缺失的时间键并写回销售记录
    async fn populate_keys(
        &self,
        doc: &Document,
        sale: &mut SaleRecord,
    ) -> std::result::Result<TimeKeys, RecordFailure> {
        let derived = self
            .deriver
            .derive_from_fields(&doc.data, &self.options.timestamp_fields)
            .map_err(|e| {
                warn!("Sale {} has no usable timestamp: {}", doc.id, e);
                RecordFailure::DeriveFailed(e)
            })?;

        if self.options.timestamp_fields.first() != Some(&derived.field) {
            debug!(
                "Sale {} keys derived from legacy field '{}'",
                doc.id, derived.field
            );
        }

        self.store
            .update_fields(SALES_COLLECTION, &doc.id, derived.keys.to_fields())
            .await
            .map_err(|e| {
                error!("Failed to persist time keys for sale {}: {}", doc.id, e);
                RecordFailure::PersistKeys(e)
            })?;

        if sale.sale_date_time.is_none() {
            sale.sale_date_time = Some(serde_json::Value::String(derived.timestamp.to_rfc3339()));
        }
        Ok(derived.keys)
    }
}
