//! Network Announcer CLI
//!
//! 把 Reddit 和 GitHub 上的动态转发到 Discord 频道

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use network_announcer::{Channel, RelayConfig, RelayRuntime};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "announcer")]
#[command(about = "Network Announcer - 把 Reddit 和 GitHub 动态转发到 Discord")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/network-announcer/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 持续运行：连接 Discord，按间隔轮询并定期汇报统计
    Run {
        /// 只记录日志，不实际发送
        #[arg(long)]
        dry_run: bool,
    },
    /// 只运行一轮
    Once {
        /// 只记录日志，不实际发送
        #[arg(long)]
        dry_run: bool,
    },
    /// 检查配置并列出轮询来源
    CheckConfig,
}

fn init_tracing(verbose: bool) {
    // 通过 RUST_LOG 环境变量控制日志级别
    // 例如: RUST_LOG=network_announcer=debug announcer run
    let default = if verbose {
        "network_announcer=debug,announcer=debug"
    } else {
        "network_announcer=info,announcer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RelayConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run { dry_run } => {
            let runtime = RelayRuntime::from_config(&config, dry_run)?;
            runtime.into_supervisor().run().await?;
        }
        Commands::Once { dry_run } => {
            let mut runtime = RelayRuntime::from_config(&config, dry_run)?;
            let identity = runtime
                .dispatcher
                .handshake()
                .await
                .context("Discord handshake failed")?;
            info!(identity = %identity, "Connected");

            let report = runtime.scheduler.run_once().await;
            for polled in &report.polled {
                println!(
                    "{:<40} observed {:>3}  announced {:>3}  suppressed {:>3}",
                    polled.source_id, polled.observed, polled.dispatched, polled.suppressed
                );
            }
            if let Some((source, error)) = report.failure {
                warn!(source = %source, error = %error, "Cycle ended early");
                anyhow::bail!("cycle aborted at {}: {}", source, error);
            }
        }
        Commands::CheckConfig => {
            let runtime = RelayRuntime::from_config(&config, true)?;
            println!("配置有效，轮询来源:");
            for source in runtime.scheduler.source_ids() {
                println!("  {}", source);
            }
            println!("\n频道映射:");
            let channels = config.channel_map()?;
            for channel in Channel::ALL {
                println!("  {:<16} -> {}", channel.as_str(), channels.id(channel));
            }
        }
    }

    Ok(())
}
