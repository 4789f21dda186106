use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, warn};

use novel_watch::app::{self, format_status};
use novel_watch::config::load_or_create;
use novel_watch::logging::{LogOptions, LogSystem};
use novel_watch::presenter::{ConsolePresenter, Presenter};

#[derive(Debug, Parser)]
#[command(name = "novel-watch")]
#[command(about = "追踪网络小说更新，只下载未读章节")]
struct Cli {
    /// 配置文件路径（默认 ./novel-watch.yml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 启用调试日志输出
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 检查更新，显示每本小说的新章节数
    Check {
        /// 以 JSON 输出
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// 下载未读章节正文，并更新已阅章节数
    Read {
        /// 正文输出文件，覆盖配置中的 read_output
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 列出追更列表
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_or_create(cli.config.as_deref())?;

    let _log = LogSystem::init(LogOptions {
        debug: cli.debug,
        to_file: config.log_to_file,
        ..LogOptions::default()
    })?;

    let reconciler = app::build_reconciler(&config)?;

    match cli.command {
        Command::Check { json } => {
            let (summary, checks) = app::passive_check(&reconciler, &config).await?;
            if json {
                let rows: Vec<_> = checks
                    .iter()
                    .map(|check| match &check.outcome {
                        Ok(delta) => json!({ "label": check.label, "new_chapters": delta }),
                        Err(e) => json!({
                            "label": check.label,
                            "new_chapters": null,
                            "error": e.to_string(),
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                ConsolePresenter::new(None).show_summary(&summary)?;
            }
        }
        Command::Read { output } => {
            let presenter = ConsolePresenter::new(output.or_else(|| config.read_output.clone()));
            let report = app::active_read(&reconciler, &config, &presenter).await?;
            for novel in &report.novels {
                if let Some(e) = &novel.error {
                    error!("{} 本次未更新: {}", novel.label, e);
                }
                if !novel.failed_chapters.is_empty() {
                    warn!(
                        "{} 有 {} 章正文获取失败，下次重试",
                        novel.label,
                        novel.failed_chapters.len()
                    );
                }
            }
        }
        Command::Status => {
            let registry = reconciler.load_registry(&config.registry_name)?;
            println!("{}", format_status(&registry));
        }
    }

    Ok(())
}
