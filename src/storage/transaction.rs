//! 单文档原子事务
//!
//! 乐观并发：读取文档及其版本号，交给调用方决定写什么，
//! 再以读到的版本号做 compare-and-set。版本已变化时重新读取并重跑决策，
//! 直到成功或用尽尝试次数。

use tracing::{debug, warn};

use super::{CommitOutcome, Document, DocumentStore, Fields};
use crate::errors::{Result, SalesRollupError};

/// 事务体的决策
#[derive(Debug)]
pub enum TxDecision<T> {
    /// 写入新的文档内容，提交成功后返回 `T`
    Write(Fields, T),
    /// 不写入，直接返回 `T`
    Abort(T),
}

/// 在 `collection/id` 上执行一次读改写事务
///
/// `body` 可能被调用多次（每次冲突后重试），因此必须只依赖传入的当前文档。
/// `max_attempts` 用尽后返回 `Store` 错误，不会产生部分写入。
pub async fn run_transaction<T, F>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    max_attempts: u32,
    mut body: F,
) -> Result<T>
where
    F: FnMut(Option<&Document>) -> Result<TxDecision<T>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let current = store.get_document(collection, id).await?;

        let (data, output) = match body(current.as_ref())? {
            TxDecision::Abort(output) => return Ok(output),
            TxDecision::Write(data, output) => (data, output),
        };

        let expected_version = current.as_ref().map(|doc| doc.version);
        match store
            .commit_document(collection, id, expected_version, data)
            .await?
        {
            CommitOutcome::Committed => {
                if attempt > 1 {
                    debug!(
                        "Transaction on {}/{} committed after {} attempts",
                        collection, id, attempt
                    );
                }
                return Ok(output);
            }
            CommitOutcome::Conflict => {
                debug!(
                    "Transaction on {}/{} conflicted (attempt {}/{})",
                    collection, id, attempt, max_attempts
                );
            }
        }
    }

    warn!(
        "Transaction on {}/{} aborted: {} attempts exhausted",
        collection, id, max_attempts
    );
    Err(SalesRollupError::store(format!(
        "Transaction on {}/{} aborted after {} attempts due to contention",
        collection, id, max_attempts
    )))
}
