//! Storage backend tests
//!
//! Tests for SeaOrmDocumentStore using temporary SQLite databases.

use sales_rollup::config::DatabaseConfig;
use sales_rollup::errors::SalesRollupError;
use sales_rollup::storage::backend::infer_backend_from_url;
use sales_rollup::storage::{
    CommitOutcome, DocumentStore, Fields, MemoryDocumentStore, SeaOrmDocumentStore,
};
use serde_json::json;
use tempfile::TempDir;

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// 创建临时 SQLite 数据库的存储实例
async fn create_temp_store() -> (SeaOrmDocumentStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let store = SeaOrmDocumentStore::new(&config, "sqlite")
        .await
        .expect("Failed to create store");

    (store, temp_dir)
}

// =============================================================================
// URL 推断测试
// =============================================================================

#[cfg(test)]
mod url_inference_tests {
    use super::*;

    #[test]
    fn test_infer_sqlite() {
        assert_eq!(infer_backend_from_url("sqlite://sales.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("sales.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("/data/sales.sqlite").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url(":memory:").unwrap(), "sqlite");
    }

    #[test]
    fn test_infer_server_backends() {
        assert_eq!(
            infer_backend_from_url("mysql://root@localhost/sales").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("mariadb://root@localhost/sales").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgres://localhost/sales").unwrap(),
            "postgres"
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/sales").unwrap(),
            "postgres"
        );
    }

    #[test]
    fn test_infer_unknown_backend() {
        let err = infer_backend_from_url("redis://localhost").unwrap_err();
        assert!(matches!(err, SalesRollupError::DatabaseConfig(_)));
    }
}

// =============================================================================
// SQLite 文档存储测试
// =============================================================================

#[cfg(test)]
mod sqlite_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, _temp_dir) = create_temp_store().await;

        let id = store
            .create_document("sales", fields(json!({"quantity": 2, "productName": "Tea"})))
            .await
            .unwrap();
        let doc = store.get_document("sales", &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.data["productName"], "Tea");

        assert!(store.get_document("sales", "missing").await.unwrap().is_none());
        assert!(store.get_document("sales_by_date", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_document_compare_and_set() {
        let (store, _temp_dir) = create_temp_store().await;

        let created = store
            .commit_document("sales_by_date", "2025-03-10", None, fields(json!({"n": 1})))
            .await
            .unwrap();
        assert_eq!(created, CommitOutcome::Committed);

        // 已存在时再次按“仅创建”提交
        let duplicate = store
            .commit_document("sales_by_date", "2025-03-10", None, fields(json!({"n": 9})))
            .await
            .unwrap();
        assert_eq!(duplicate, CommitOutcome::Conflict);

        let updated = store
            .commit_document("sales_by_date", "2025-03-10", Some(1), fields(json!({"n": 2})))
            .await
            .unwrap();
        assert_eq!(updated, CommitOutcome::Committed);

        // 过期版本
        let stale = store
            .commit_document("sales_by_date", "2025-03-10", Some(1), fields(json!({"n": 3})))
            .await
            .unwrap();
        assert_eq!(stale, CommitOutcome::Conflict);

        let doc = store
            .get_document("sales_by_date", "2025-03-10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["n"], 2);
    }

    #[tokio::test]
    async fn test_update_fields_merges() {
        let (store, _temp_dir) = create_temp_store().await;
        let id = store
            .create_document("sales", fields(json!({"quantity": 1, "dateKey": null})))
            .await
            .unwrap();

        store
            .update_fields("sales", &id, fields(json!({"dateKey": "2025-03-10"})))
            .await
            .unwrap();

        let doc = store.get_document("sales", &id).await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["quantity"], 1);
        assert_eq!(doc.data["dateKey"], "2025-03-10");
    }

    #[tokio::test]
    async fn test_update_fields_missing_document() {
        let (store, _temp_dir) = create_temp_store().await;
        let err = store
            .update_fields("sales", "ghost", fields(json!({"x": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, SalesRollupError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_update_fields_keep_every_field() {
        let (store, _temp_dir) = create_temp_store().await;
        let store = std::sync::Arc::new(store);
        let id = store
            .create_document("sales", fields(json!({"quantity": 1})))
            .await
            .unwrap();

        let writers = 8;
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let mut update = Fields::new();
                    update.insert(format!("field{}", i), json!(i));
                    store.update_fields("sales", &id, update).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get_document("sales", &id).await.unwrap().unwrap();
        assert_eq!(doc.version, 1 + writers);
        assert_eq!(doc.data["quantity"], 1);
        for i in 0..writers {
            assert_eq!(doc.data[&format!("field{}", i)], i);
        }
    }

    #[tokio::test]
    async fn test_update_fields_preserves_committed_data() {
        let (store, _temp_dir) = create_temp_store().await;
        store
            .commit_document("sales", "s1", None, fields(json!({"quantity": 1})))
            .await
            .unwrap();
        store
            .commit_document("sales", "s1", Some(1), fields(json!({"quantity": 3})))
            .await
            .unwrap();

        store
            .update_fields("sales", "s1", fields(json!({"dateKey": "2025-03-10"})))
            .await
            .unwrap();

        let doc = store.get_document("sales", "s1").await.unwrap().unwrap();
        assert_eq!(doc.version, 3);
        assert_eq!(doc.data["quantity"], 3);
        assert_eq!(doc.data["dateKey"], "2025-03-10");
    }

    #[tokio::test]
    async fn test_list_documents_pages_in_id_order() {
        let (store, _temp_dir) = create_temp_store().await;
        for id in ["d", "b", "a", "e", "c"] {
            store
                .commit_document("sales_by_minute", id, None, fields(json!({"id": id})))
                .await
                .unwrap();
        }
        store
            .commit_document("other", "a0", None, fields(json!({})))
            .await
            .unwrap();

        let first = store.list_documents("sales_by_minute", None, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let rest = store
            .list_documents("sales_by_minute", Some("b"), 10)
            .await
            .unwrap();
        let ids: Vec<_> = rest.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_close() {
        let (store, _temp_dir) = create_temp_store().await;
        assert_eq!(store.backend_name(), "sqlite");
        store.close().await.unwrap();
    }
}

// =============================================================================
// 内存文档存储与 SQLite 行为一致性
// =============================================================================

#[cfg(test)]
mod memory_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_matches_sqlite_semantics() {
        let memory = MemoryDocumentStore::new();

        assert_eq!(
            memory
                .commit_document("c", "k", None, fields(json!({"v": 1})))
                .await
                .unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            memory
                .commit_document("c", "k", Some(7), fields(json!({"v": 2})))
                .await
                .unwrap(),
            CommitOutcome::Conflict
        );
        assert_eq!(
            memory
                .commit_document("c", "missing", Some(1), fields(json!({"v": 2})))
                .await
                .unwrap(),
            CommitOutcome::Conflict
        );
        let err = memory
            .update_fields("c", "missing", fields(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SalesRollupError::NotFound(_)));
    }
}
