//! SeaORM document store backend
//!
//! Stores every collection in a single `documents` table as JSON text,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL. Optimistic
//! concurrency uses the `version` column.

mod connection;
pub mod retry;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::OnConflict,
};
use tracing::{debug, warn};

use super::{CommitOutcome, Document, DocumentStore, Fields};
use crate::config::DatabaseConfig;
use crate::errors::{Result, SalesRollupError};
use migration::entities::document;

pub use connection::{connect_generic, connect_sqlite, run_migrations};
use retry::RetryConfig;

/// `update_fields` 遇到版本冲突时的最大重读次数
const UPDATE_FIELDS_MAX_ATTEMPTS: u32 = 32;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(SalesRollupError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based document store
#[derive(Clone)]
pub struct SeaOrmDocumentStore {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: RetryConfig,
}

impl SeaOrmDocumentStore {
    /// 连接数据库并运行迁移
    pub async fn new(config: &DatabaseConfig, backend_name: &str) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(SalesRollupError::database_config("database_url is not set"));
        }

        let db = if backend_name == "sqlite" {
            connect_sqlite(&config.database_url).await?
        } else {
            connect_generic(config, backend_name).await?
        };

        run_migrations(&db).await?;

        Ok(Self::from_connection(db, backend_name, RetryConfig::from(config)))
    }

    /// 基于已有连接构建（连接需已完成迁移）
    pub fn from_connection(
        db: DatabaseConnection,
        backend_name: &str,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            db,
            backend_name: backend_name.to_string(),
            retry_config,
        }
    }

    fn decode(model: document::Model) -> Result<Document> {
        let data: Fields = serde_json::from_str(&model.data).map_err(|e| {
            SalesRollupError::serialization(format!(
                "Document {}/{} is not a JSON object: {}",
                model.collection, model.doc_id, e
            ))
        })?;
        Ok(Document {
            id: model.doc_id,
            version: model.version as u64,
            data,
        })
    }

    async fn insert_if_absent(&self, collection: &str, id: &str, json: &str) -> Result<bool> {
        let now = Utc::now();
        let model = document::ActiveModel {
            collection: Set(collection.to_string()),
            doc_id: Set(id.to_string()),
            data: Set(json.to_string()),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = retry::with_retry("insert_document", self.retry_config, || async {
            document::Entity::insert(model.clone())
                .on_conflict(
                    OnConflict::columns([document::Column::Collection, document::Column::DocId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec(&self.db)
                .await
        })
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sea_orm::DbErr::RecordNotInserted) => Ok(false),
            Err(e) => {
                // 某些数据库后端在 do_nothing 时返回特定错误
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("no rows") || err_str.contains("record not inserted") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SeaOrmDocumentStore {
    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    async fn list_documents(
        &self,
        collection: &str,
        start_after: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Document>> {
        let models = retry::with_retry("list_documents", self.retry_config, || async {
            let mut query =
                document::Entity::find().filter(document::Column::Collection.eq(collection));
            if let Some(after) = start_after {
                query = query.filter(document::Column::DocId.gt(after));
            }
            query
                .order_by_asc(document::Column::DocId)
                .limit(limit)
                .all(&self.db)
                .await
        })
        .await?;

        models.into_iter().map(Self::decode).collect()
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let model = retry::with_retry("get_document", self.retry_config, || async {
            document::Entity::find()
                .filter(document::Column::Collection.eq(collection))
                .filter(document::Column::DocId.eq(id))
                .one(&self.db)
                .await
        })
        .await?;

        model.map(Self::decode).transpose()
    }

    async fn create_document(&self, collection: &str, data: Fields) -> Result<String> {
        let json = serde_json::to_string(&data)?;
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            if self.insert_if_absent(collection, &id, &json).await? {
                debug!("Created document {}/{}", collection, id);
                return Ok(id);
            }
            warn!("Generated document id {} collided, regenerating", id);
        }
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        // 读取后按版本号条件写回，版本变化说明有并发写入，重新读取合并
        for attempt in 1..=UPDATE_FIELDS_MAX_ATTEMPTS {
            let existing = self.get_document(collection, id).await?.ok_or_else(|| {
                SalesRollupError::not_found(format!("Document {}/{} does not exist", collection, id))
            })?;

            let mut data = existing.data;
            data.extend(fields.clone());

            match self
                .commit_document(collection, id, Some(existing.version), data)
                .await?
            {
                CommitOutcome::Committed => return Ok(()),
                CommitOutcome::Conflict => debug!(
                    "update_fields {}/{} lost version {} race (attempt {}/{})",
                    collection, id, existing.version, attempt, UPDATE_FIELDS_MAX_ATTEMPTS
                ),
            }
        }

        Err(SalesRollupError::store(format!(
            "update_fields {}/{} still conflicting after {} attempts",
            collection, id, UPDATE_FIELDS_MAX_ATTEMPTS
        )))
    }

    async fn commit_document(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
        data: Fields,
    ) -> Result<CommitOutcome> {
        let json = serde_json::to_string(&data)?;

        let Some(expected) = expected_version else {
            return Ok(if self.insert_if_absent(collection, id, &json).await? {
                CommitOutcome::Committed
            } else {
                CommitOutcome::Conflict
            });
        };

        // 条件更新：仅当版本号未变化时写入
        let update = document::ActiveModel {
            data: Set(json),
            version: Set(expected as i64 + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        let result = retry::with_retry("commit_document", self.retry_config, || async {
            document::Entity::update_many()
                .set(update.clone())
                .filter(document::Column::Collection.eq(collection))
                .filter(document::Column::DocId.eq(id))
                .filter(document::Column::Version.eq(expected as i64))
                .exec(&self.db)
                .await
        })
        .await?;

        Ok(if result.rows_affected == 1 {
            CommitOutcome::Committed
        } else {
            CommitOutcome::Conflict
        })
    }

    async fn close(&self) -> Result<()> {
        self.db.clone().close().await?;
        Ok(())
    }
}
