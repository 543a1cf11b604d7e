//! 文档存储抽象
//!
//! 汇总引擎只依赖 [`DocumentStore`] trait：按集合分页读取、单文档读取、
//! 创建、字段更新，以及基于版本号的比较并写入（compare-and-set）。
//! 原子读改写事务由 [`transaction::run_transaction`] 在 compare-and-set 之上构建。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod memory;
pub mod transaction;

pub use backend::SeaOrmDocumentStore;
pub use memory::MemoryDocumentStore;
pub use transaction::{TxDecision, run_transaction};

/// 文档字段
pub type Fields = Map<String, Value>;

/// 集合中的一个文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 文档 ID（集合内唯一）
    pub id: String,
    /// 版本号，每次成功写入后递增，用于乐观并发控制
    pub version: u64,
    /// 文档内容
    pub data: Fields,
}

/// compare-and-set 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// 写入成功
    Committed,
    /// 读取之后文档已被其他写入者修改（或已被创建）
    Conflict,
}

/// 文档存储客户端
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 存储后端名称（用于日志）
    fn backend_name(&self) -> &str;

    /// 按文档 ID 升序分页读取集合，`start_after` 为上一页最后一个 ID
    async fn list_documents(
        &self,
        collection: &str,
        start_after: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Document>>;

    /// 读取单个文档
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// 创建文档，由存储分配 ID
    async fn create_document(&self, collection: &str, data: Fields) -> Result<String>;

    /// 合并更新已存在文档的部分字段；文档不存在时返回 NotFound
    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// 比较并写入整个文档
    ///
    /// `expected_version` 为 `None` 表示仅在文档不存在时创建；
    /// 为 `Some(v)` 表示仅在当前版本仍为 `v` 时覆盖。
    async fn commit_document(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Fields,
    ) -> Result<CommitOutcome>;

    /// 关闭底层连接
    async fn close(&self) -> Result<()>;
}

pub struct StoreFactory;

impl StoreFactory {
    /// 根据数据库配置创建存储（从 URL 自动推断数据库类型）
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
        let backend_type = backend::infer_backend_from_url(&config.database_url)?;
        let store = SeaOrmDocumentStore::new(config, &backend_type).await?;
        info!("Using document store backend: {}", store.backend_name());
        Ok(Arc::new(store))
    }
}
