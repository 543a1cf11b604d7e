//! 时间键推导与汇总合并性能基准测试

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sales_rollup::aggregation::{AggregationWriter, TimeKeyDeriver};
use sales_rollup::models::{AggregateDocument, Granularity, SaleRecord, SaleSummary};
use sales_rollup::storage::MemoryDocumentStore;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

// ============== 时间键推导 ==============

fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("time_keys/derive");

    let instant = Utc.with_ymd_and_hms(2025, 3, 10, 14, 5, 30).unwrap();
    for zone in ["UTC", "Asia/Shanghai", "America/New_York"] {
        let deriver = TimeKeyDeriver::from_name(zone).unwrap();
        group.bench_with_input(BenchmarkId::new("instant", zone), &deriver, |b, d| {
            b.iter(|| d.derive(black_box(instant)));
        });
    }

    let deriver = TimeKeyDeriver::default();
    for (name, value) in [
        ("rfc3339", json!("2025-03-10T14:05:30Z")),
        ("naive", json!("2025-03-10 14:05:30")),
        ("epoch_millis", json!(1741615530000_i64)),
        ("seconds_object", json!({"seconds": 1741615530, "nanoseconds": 0})),
    ] {
        group.bench_with_input(BenchmarkId::new("parse", name), &value, |b, v| {
            b.iter(|| deriver.derive_value(black_box(v)).unwrap());
        });
    }

    group.finish();
}

// ============== 汇总文档合并 ==============

fn summary(i: usize) -> SaleSummary {
    SaleSummary {
        id: format!("sale-{}", i),
        product_id: Some("p1".to_string()),
        product_name: None,
        quantity: 1,
        unit_price: Some(9.5),
        total_amount: 9.5,
        store_location: None,
        sale_date_time: None,
    }
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("time_keys/merge");

    for size in [10, 1000, 10000] {
        let now = Utc::now();
        let mut doc = AggregateDocument::new(summary(0), now);
        for i in 1..size {
            doc.merge(summary(i), now).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("duplicate", size), &doc, |b, doc| {
            b.iter(|| {
                let mut doc = doc.clone();
                assert!(!doc.merge(summary(size / 2), now).unwrap());
            });
        });
    }

    group.finish();
}

// ============== 内存存储上的事务写入 ==============

fn bench_upsert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MemoryDocumentStore::new());
    let writer = AggregationWriter::new(store, 5);
    let mut counter = 0u64;

    c.bench_function("time_keys/upsert_memory", |b| {
        b.to_async(&rt).iter(|| {
            counter += 1;
            let sale = SaleRecord {
                id: format!("sale-{}", counter),
                quantity: Some(1),
                total_amount: Some(2.0),
                ..Default::default()
            };
            let bucket = format!("bucket-{}", counter);
            let writer = writer.clone();
            async move {
                writer
                    .upsert_aggregate(Granularity::Minute, &bucket, &sale)
                    .await
                    .unwrap()
            }
        });
    });
}

criterion_group!(benches, bench_derive, bench_merge, bench_upsert);
criterion_main!(benches);
