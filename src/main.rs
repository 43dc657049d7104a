//! LazyLearn - 教材提取流水线客户端
//!
//! - Domain: pipeline/, conversation/ (Bounded Contexts)
//! - Application: ports, services
//! - Infrastructure: adapters (HTTP / Fake backend), memory

use std::process::ExitCode;

use clap::Parser as _;

use lazylearn::cli::Cli;
use lazylearn::config::{load_config_from_path, print_config};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志（输出到 stderr，stdout 留给结果）
    let log_filter = format!("{},lazylearn={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::debug!(?cli, "parsed cli");
    print_config(&config);

    lazylearn::runner::run(cli.command, &config).await
}
