// fetch.rs — fetch 子命令的完整流程
// 解析链接 -> 决定目标目录 -> 顺序收集 ID -> 写入 ID 记录 -> 并发下载
// 壁纸源和下载器由调用方传入，main 里用真实的 Wallhaven 客户端

use crate::batch::{BatchReport, BatchRunner};
use crate::collector::{self, IdCollector};
use crate::downloader::Downloader;
use crate::error::Result;
use crate::ledger::IdLedger;
use crate::query::SearchQuery;
use crate::source::WallpaperSource;
use rust_i18n::t;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 一次 fetch 的输入，命令行参数和配置已合并
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub link: String,
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    pub workers: usize,
    /// 下载根目录，实际保存到其下按分类命名的子目录
    pub root: PathBuf,
    pub ledger_path: PathBuf,
    pub page_delay: (Duration, Duration),
}

#[derive(Debug)]
pub struct FetchSummary {
    /// 收集到的原始 ID，跨页重复的保留
    pub ids: Vec<String>,
    pub batch: BatchReport,
}

/// 执行一次完整的 fetch
///
/// 只有链接和页码范围的问题、目标目录无法创建会返回错误；
/// 单页或单张壁纸的失败记录在 [`FetchSummary`] 里。
pub async fn run(
    source: Arc<dyn WallpaperSource>,
    downloader: Downloader,
    request: FetchRequest,
) -> Result<FetchSummary> {
    let query = SearchQuery::from_link(&request.link)?;
    let pages = collector::page_range(request.start_page, request.end_page, query.page)?;

    info!("开始执行 URL: {} 下载任务......", request.link);
    info!("解析的 URL 参数: {:?}", query);

    // 按照 categories 参数下载到不同的文件夹
    let target_dir = request.root.join(query.folder_name());
    tokio::fs::create_dir_all(&target_dir).await?;
    println!("{}", t!("target_dir", path => target_dir.display()));

    // 第一阶段：顺序收集 ID
    println!("{}", t!("search_start"));
    let ids = IdCollector::new(source.as_ref(), request.page_delay)
        .collect(&query, pages)
        .await;
    info!("共获取到 {} 张壁纸", ids.len());

    if ids.is_empty() {
        println!("{}", t!("no_wallpapers"));
        return Ok(FetchSummary {
            ids,
            batch: BatchReport::default(),
        });
    }

    // 第二阶段：写入 ID 记录（只在这里写一次，下载开始前完成）
    let ledger = IdLedger::new(request.ledger_path);
    match ledger.persist(&ids).await {
        Ok(report) => println!(
            "{}",
            t!(
                "ledger_done",
                appended => report.appended.len(),
                skipped => report.skipped,
                path => ledger.path().display()
            )
        ),
        Err(e) => error!("写入 {} 失败: {}", ledger.path().display(), e),
    }

    // 第三阶段：并发下载
    let unique = collector::unique_ids(&ids);
    info!("获取到的 wallpaper_id: {:?}", unique);
    println!(
        "{}",
        t!("download_start", count => unique.len(), workers => request.workers)
    );

    let batch = BatchRunner::new(source, downloader, request.workers)
        .run_all(&unique, &target_dir)
        .await;

    Ok(FetchSummary { ids, batch })
}
