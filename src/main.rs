// main.rs — 程序入口
// 负责初始化异步运行时、解析命令行参数、分发子命令
// fetch 的完整流程见 fetch.rs

mod batch; // 并发下载调度
mod cli; // 声明 cli 模块，对应 src/cli.rs
mod collector; // 壁纸 ID 收集
mod config; // 声明 config 模块，对应 src/config.rs
mod downloader; // 单张壁纸下载
mod error;
mod fetch; // fetch 子命令的完整流程
mod http; // 带重试的 HTTP 执行器
mod ledger; // 壁纸 ID 记录文件
mod logging;
mod query; // 搜索链接解析
mod source;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales");

use clap::{CommandFactory, Parser}; // 引入 Parser trait 的 parse() 方法; CommandFactory 用于生成补全脚本
use clap_complete::generate; // 引入补全脚本生成函数
use cli::{Cli, Commands}; // 引入 CLI 结构体和子命令枚举
use config::{AppConfig, mask_secret}; // 引入应用配置
use downloader::Downloader;
use fetch::FetchRequest;
use http::HttpExecutor;
use indicatif::MultiProgress;
use rust_i18n::t; // 引入翻译宏
use source::WallpaperSource;
use source::wallhaven::WallhavenClient; // 引入 Wallhaven API 客户端
use std::path::PathBuf;
use std::sync::Arc;

/// fetch 子命令的参数
struct FetchArgs {
    link: String,
    start_page: Option<u32>,
    end_page: Option<u32>,
    workers: Option<usize>,
    dir: Option<PathBuf>,
    ledger: Option<PathBuf>,
}

/// `#[tokio::main]` 宏将 async main 转换为同步 main + tokio 运行时
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    // 解析命令行参数
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            link,
            start_page,
            end_page,
            workers,
            dir,
            ledger,
        } => {
            // 配置和链接的问题直接终止程序
            let config = AppConfig::load()?;
            logging::init(&config.log_file)?;
            let args = FetchArgs {
                link,
                start_page,
                end_page,
                workers,
                dir,
                ledger,
            };
            handle_fetch(&config, args).await?;
        }

        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "wallhaven-dl",
                &mut std::io::stdout(),
            );
        }

        Commands::Config { action } => {
            let mut config = AppConfig::load()?;
            handle_config(&mut config, &action)?;
        }
    }

    Ok(())
}

/// 处理 fetch 子命令：按链接收集壁纸 ID 并并发下载
async fn handle_fetch(
    config: &AppConfig,
    args: FetchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = config.require_api_key()?.to_string();

    let http = Arc::new(HttpExecutor::new(&config.network)?);
    let source: Arc<dyn WallpaperSource> =
        Arc::new(WallhavenClient::new(Arc::clone(&http), api_key));
    let downloader = Downloader::new(http, MultiProgress::new());

    let request = FetchRequest {
        link: args.link,
        start_page: args.start_page,
        end_page: args.end_page,
        workers: args.workers.unwrap_or(config.network.max_workers),
        root: args.dir.unwrap_or_else(|| config.download_dir.clone()),
        ledger_path: args.ledger.unwrap_or_else(|| config.ledger_path.clone()),
        page_delay: config.network.page_delay(),
    };
    let summary = fetch::run(source, downloader, request).await?;
    if summary.ids.is_empty() {
        return Ok(());
    }

    let report = &summary.batch;
    for outcome in &report.outcomes {
        if let batch::ItemStatus::Failed(reason) = &outcome.status {
            println!("{}", t!("item_failed", id => outcome.id, reason => reason));
        }
    }
    println!(
        "{}",
        t!(
            "download_done",
            downloaded => report.downloaded(),
            skipped => report.skipped(),
            failed => report.failed()
        )
    );
    Ok(())
}

/// 处理 config 子命令：查看或修改配置
fn handle_config(
    config: &mut AppConfig,
    action: &cli::ConfigAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        cli::ConfigAction::Show => {
            println!("{}", t!("config_title"));
            println!("{}", t!("config_path", path => config.config_path.display()));
            println!(
                "{}",
                t!("config_download_dir", path => config.download_dir.display())
            );
            println!("{}", t!("config_ledger", path => config.ledger_path.display()));
            let key = config
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "None".to_string());
            println!("{}", t!("config_api_key", key => key));
            let proxy = config.network.proxy.as_deref().unwrap_or("None");
            println!("{}", t!("config_proxy", proxy => proxy));
            println!(
                "{}",
                t!("config_workers", workers => config.network.max_workers)
            );
        }
        cli::ConfigAction::Schema => {
            println!("{}", AppConfig::get_schema()?);
        }
        cli::ConfigAction::Dump => {
            println!("{}", config.to_toml());
        }
        cli::ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            config.save()?;
            println!("{}", t!("config_updated", key => key, value => value));
        }
    }
    Ok(())
}
