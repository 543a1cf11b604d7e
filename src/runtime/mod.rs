//! Application lifecycle and execution modes
//!
//! - `lifetime`: 启动（创建存储、校验配置）与关闭
//! - `modes`: 各子命令的执行入口

pub mod lifetime;
pub mod modes;

pub use lifetime::{StartupContext, prepare_startup};
pub use modes::{run_backfill, run_verify};
