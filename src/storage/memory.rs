//! 内存文档存储
//!
//! 线程安全、带版本号的内存实现，语义与 SeaORM 后端一致，
//! 主要用于测试（并发写入、故障注入）。

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CommitOutcome, Document, DocumentStore, Fields};
use crate::errors::{Result, SalesRollupError};

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    data: Fields,
}

type Collection = BTreeMap<String, StoredDocument>;

/// 内存文档存储
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定 ID 写入文档（覆盖），用于准备测试数据
    pub fn insert_with_id(&self, collection: &str, id: &str, data: Fields) {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        let version = docs.get(id).map(|d| d.version + 1).unwrap_or(1);
        docs.insert(id.to_string(), StoredDocument { version, data });
    }

    /// 集合中的文档数量
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_documents(
        &self,
        collection: &str,
        start_after: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let lower = match start_after {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };

        Ok(docs
            .range((lower, Bound::Unbounded))
            .take(limit as usize)
            .map(|(id, doc)| Document {
                id: id.clone(),
                version: doc.version,
                data: doc.data.clone(),
            })
            .collect())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| Document {
                id: id.to_string(),
                version: doc.version,
                data: doc.data.clone(),
            }))
    }

    async fn create_document(&self, collection: &str, data: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), StoredDocument { version: 1, data });
        Ok(id)
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut collections = self.collections.write();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| {
                SalesRollupError::not_found(format!("Document {}/{} does not exist", collection, id))
            })?;

        doc.data.extend(fields);
        doc.version += 1;
        Ok(())
    }

    async fn commit_document(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Fields,
    ) -> Result<CommitOutcome> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();

        match expected_version {
            None => {
                if docs.contains_key(id) {
                    return Ok(CommitOutcome::Conflict);
                }
                docs.insert(id.to_string(), StoredDocument { version: 1, data });
                Ok(CommitOutcome::Committed)
            }
            Some(expected) => match docs.get_mut(id) {
                Some(doc) if doc.version == expected => {
                    doc.version += 1;
                    doc.data = data;
                    Ok(CommitOutcome::Committed)
                }
                _ => Ok(CommitOutcome::Conflict),
            },
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
