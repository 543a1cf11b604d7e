//! 销售汇总引擎
//!
//! - `time_keys`: 时间键推导（分钟 / 小时 / 日期）
//! - `writer`: 单个时间桶的幂等事务写入
//! - `backfill`: 历史销售记录回填
//! - `ledger`: 新销售实时入账
//! - `reader`: 汇总读取与一致性校验

pub mod backfill;
pub mod ledger;
pub mod reader;
pub mod time_keys;
pub mod writer;

pub use backfill::{
    BackfillOptions, BackfillOrchestrator, BackfillReport, RecordFailure, RecordOutcome,
};
pub use ledger::{NewSale, RecordedSale, SalesLedger};
pub use reader::{AggregateReader, BucketViolation, VerifyReport};
pub use time_keys::{DerivedKeys, TimeKeyDeriver};
pub use writer::AggregationWriter;
