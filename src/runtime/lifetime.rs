//! 启动与关闭

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::storage::{DocumentStore, StoreFactory};

/// 子命令运行所需的上下文
pub struct StartupContext {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<StaticConfig>,
}

impl StartupContext {
    /// 关闭存储连接；失败只记录警告
    pub async fn shutdown(self) {
        debug!("Closing {} store", self.store.backend_name());
        if let Err(e) = self.store.close().await {
            warn!("Failed to close store cleanly: {}", e);
        }
    }
}

/// 校验配置并连接存储（含迁移）
pub async fn prepare_startup(config: Arc<StaticConfig>) -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    config
        .aggregation
        .validate()
        .context("Invalid aggregation configuration")?;

    let store = StoreFactory::create(&config.database)
        .await
        .context("Failed to create document store")?;

    info!(
        "Startup completed in {} ms (time zone: {})",
        start_time.elapsed().as_millis(),
        config.aggregation.time_zone
    );

    Ok(StartupContext { store, config })
}
