use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::error;

use sales_rollup::cli::{Cli, Commands};
use sales_rollup::config::{StaticConfig, get_config, init_config};
use sales_rollup::errors::SalesRollupError;
use sales_rollup::runtime::{self, StartupContext};
use sales_rollup::system::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.command() == &Commands::GenerateConfig {
        println!("{}", StaticConfig::generate_sample_config());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_config(cli.config.as_deref()) {
        eprintln!("{}", e.format_colored());
        return ExitCode::FAILURE;
    }
    let config = get_config();
    // 保持 guard 存活直到退出，确保日志全部落盘
    let _log_guard = init_logging(&config.logging);

    let ctx = match runtime::prepare_startup(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let result = run_command(cli.command(), &ctx).await;
    ctx.shutdown().await;

    match result {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// 输出错误：领域错误带错误码，其余按 anyhow 链输出
fn report_error(e: &anyhow::Error) {
    error!("{:#}", e);
    match e.downcast_ref::<SalesRollupError>() {
        Some(err) => eprintln!("{}\n  ({})", err.format_colored(), e),
        None => eprintln!("{} {:#}", "[ERROR]".red().bold(), e),
    }
}

async fn run_command(command: &Commands, ctx: &StartupContext) -> Result<ExitCode> {
    match command {
        Commands::Backfill => {
            let report = runtime::run_backfill(ctx).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { granularity } => {
            let reports = runtime::run_verify(ctx, *granularity).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            if reports.iter().all(|r| r.is_consistent()) {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("{} Inconsistent rollup buckets found", "[WARN]".yellow().bold());
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::GenerateConfig => {
            println!("{}", StaticConfig::generate_sample_config());
            Ok(ExitCode::SUCCESS)
        }
    }
}
