//! 子命令执行

use anyhow::{Context, Result};
use tracing::info;

use super::StartupContext;
use crate::aggregation::{AggregateReader, BackfillOrchestrator, BackfillReport, VerifyReport};
use crate::models::Granularity;

/// 回填全部销售记录
pub async fn run_backfill(ctx: &StartupContext) -> Result<BackfillReport> {
    let orchestrator = BackfillOrchestrator::from_config(ctx.store.clone(), &ctx.config.aggregation)
        .context("Failed to build backfill orchestrator")?;
    let report = orchestrator
        .run_backfill()
        .await
        .context("Backfill aborted while reading sales")?;
    Ok(report)
}

/// 校验一个或全部粒度的时间桶
pub async fn run_verify(
    ctx: &StartupContext,
    granularity: Option<Granularity>,
) -> Result<Vec<VerifyReport>> {
    let reader = AggregateReader::new(ctx.store.clone());
    let targets = match granularity {
        Some(g) => vec![g],
        None => Granularity::ALL.to_vec(),
    };

    let mut reports = Vec::with_capacity(targets.len());
    for granularity in targets {
        let report = reader
            .verify(granularity)
            .await
            .with_context(|| format!("Failed to verify {} rollups", granularity))?;
        reports.push(report);
    }

    let inconsistent: usize = reports.iter().map(|r| r.violations.len()).sum();
    info!("Verification finished: {} inconsistent buckets", inconsistent);
    Ok(reports)
}
