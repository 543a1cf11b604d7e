//! 汇总读取与一致性校验

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::Result;
use crate::models::{AggregateDocument, Granularity};
use crate::storage::DocumentStore;

/// 校验扫描时每页读取的文档数
const VERIFY_PAGE_SIZE: u64 = 200;

/// 一个不一致的时间桶
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketViolation {
    pub key: String,
    pub problems: Vec<String>,
}

/// 某个粒度的校验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub granularity: String,
    pub checked: u64,
    pub violations: Vec<BucketViolation>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// 汇总文档读取器
#[derive(Clone)]
pub struct AggregateReader {
    store: Arc<dyn DocumentStore>,
}

impl AggregateReader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 读取单个时间桶
    pub async fn get(&self, granularity: Granularity, key: &str) -> Result<Option<AggregateDocument>> {
        self.store
            .get_document(granularity.collection(), key)
            .await?
            .map(|doc| AggregateDocument::from_fields(&doc.data))
            .transpose()
    }

    /// 读取 `[from_key, to_key]` 区间内的时间桶，按键升序
    ///
    /// 时间键按字典序即时间顺序排列。
    pub async fn list(
        &self,
        granularity: Granularity,
        from_key: &str,
        to_key: &str,
    ) -> Result<Vec<(String, AggregateDocument)>> {
        let mut buckets = Vec::new();
        if from_key > to_key {
            return Ok(buckets);
        }

        if let Some(first) = self.get(granularity, from_key).await? {
            buckets.push((from_key.to_string(), first));
        }

        let mut cursor = from_key.to_string();
        loop {
            let page = self
                .store
                .list_documents(granularity.collection(), Some(&cursor), VERIFY_PAGE_SIZE)
                .await?;
            let page_len = page.len() as u64;

            for doc in page {
                if doc.id.as_str() > to_key {
                    return Ok(buckets);
                }
                cursor = doc.id.clone();
                buckets.push((doc.id, AggregateDocument::from_fields(&doc.data)?));
            }

            if page_len < VERIFY_PAGE_SIZE {
                return Ok(buckets);
            }
        }
    }

    /// 扫描一个粒度的全部时间桶，检查汇总值与明细是否一致
    pub async fn verify(&self, granularity: Granularity) -> Result<VerifyReport> {
        let collection = granularity.collection();
        let mut report = VerifyReport {
            granularity: granularity.to_string(),
            checked: 0,
            violations: Vec::new(),
        };

        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .store
                .list_documents(collection, cursor.as_deref(), VERIFY_PAGE_SIZE)
                .await?;
            let page_len = page.len() as u64;

            for doc in page {
                report.checked += 1;
                let problems = match AggregateDocument::from_fields(&doc.data) {
                    Ok(aggregate) => aggregate.invariant_violations(),
                    Err(e) => vec![e.message().to_string()],
                };
                if !problems.is_empty() {
                    warn!("Bucket {}/{} is inconsistent: {}", collection, doc.id, problems.join("; "));
                    report.violations.push(BucketViolation {
                        key: doc.id.clone(),
                        problems,
                    });
                }
                cursor = Some(doc.id);
            }

            if page_len < VERIFY_PAGE_SIZE {
                break;
            }
        }

        info!(
            "Verified {}: {} buckets checked, {} inconsistent",
            collection,
            report.checked,
            report.violations.len()
        );
        Ok(report)
    }
}
