// downloader.rs — 单张壁纸下载模块
// 文件名取原图 URL 的最后一段；目标文件已存在则直接跳过，不发任何请求
// 下载时先写 <文件名>.part，写完并核对大小后再改名，失败时删除 .part

use crate::error::{Error, Result};
use crate::http::HttpExecutor;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// 单张壁纸的下载结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// 新下载完成
    Downloaded { path: PathBuf, bytes: u64 },
    /// 本地已有同名文件
    Skipped { path: PathBuf },
}

/// 从原图 URL 中提取文件名
/// 如 https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg -> wallhaven-94x38z.jpg
/// 最后一段为空时返回 None
pub fn file_name_from_url(location: &str) -> Option<&str> {
    let without_query = location.split(['?', '#']).next().unwrap_or(location);
    without_query.rsplit('/').next().filter(|name| !name.is_empty())
}

/// 核对写入字节数和响应声明的 Content-Length
fn check_length(path: &Path, expected: Option<u64>, actual: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(Error::LengthMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn make_progress_bar(total: Option<u64>, name: &str) -> ProgressBar {
    let (bar, template) = match total {
        Some(size) => (
            ProgressBar::new(size),
            "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}",
        ),
    };
    bar.set_style(
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━╌"),
    );
    bar.set_message(name.to_string());
    bar
}

/// 流式下载器，所有下载共用一个 MultiProgress 显示进度
#[derive(Clone)]
pub struct Downloader {
    http: Arc<HttpExecutor>,
    progress: MultiProgress,
}

impl Downloader {
    pub fn new(http: Arc<HttpExecutor>, progress: MultiProgress) -> Self {
        Self { http, progress }
    }

    /// 把 location 指向的图片下载到 dir 目录
    pub async fn fetch(&self, location: &str, dir: &Path) -> Result<DownloadOutcome> {
        let file_name = file_name_from_url(location)
            .ok_or_else(|| Error::NoFileName(location.to_string()))?;
        let dest = dir.join(file_name);

        if fs::try_exists(&dest).await? {
            info!("图片 {} 已存在，跳过下载。", file_name);
            return Ok(DownloadOutcome::Skipped { path: dest });
        }

        let response = self.http.get_stream(location).await?;
        let total = response.content_length();
        debug!(location, ?total, "开始下载");

        let temp = part_path(&dest);
        let bar = self.progress.add(make_progress_bar(total, file_name));

        let written = match Self::write_stream(response, &temp, &bar).await {
            Ok(written) => written,
            Err(e) => {
                bar.abandon();
                let _ = fs::remove_file(&temp).await;
                return Err(e);
            }
        };
        bar.finish_and_clear();

        if let Err(e) = check_length(&dest, total, written) {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        fs::rename(&temp, &dest).await?;

        let size_mb = written as f64 / (1024.0 * 1024.0);
        info!("图片已保存为 {}，大小：{:.2} MB", dest.display(), size_mb);

        Ok(DownloadOutcome::Downloaded {
            path: dest,
            bytes: written,
        })
    }

    /// 逐块写入文件，返回写入的总字节数
    async fn write_stream(
        response: reqwest::Response,
        temp: &Path,
        bar: &ProgressBar,
    ) -> Result<u64> {
        let mut file = File::create(temp).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.set_position(written);
        }

        file.flush().await?;
        Ok(written)
    }
}
