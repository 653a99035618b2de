// ledger.rs — 壁纸 ID 记录文件
// 每行一个 ID，只追加不改写；写入前先读出已有 ID，已存在的跳过

use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// 一次写入的结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LedgerReport {
    /// 本次新追加的 ID，顺序与输入一致
    pub appended: Vec<String>,
    /// 因已存在而跳过的数量
    pub skipped: usize,
}

pub struct IdLedger {
    path: PathBuf,
}

impl IdLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读出文件中已有的 ID，文件不存在视为空
    pub async fn load(&self) -> Result<HashSet<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// 把不在文件中的 ID 追加到末尾
    ///
    /// 输入中重复出现的 ID 只写一次。
    pub async fn persist(&self, ids: &[String]) -> Result<LedgerReport> {
        let mut known = self.load().await?;
        let mut report = LedgerReport::default();
        let mut buffer = String::new();

        for id in ids {
            if known.insert(id.clone()) {
                buffer.push_str(id);
                buffer.push('\n');
                info!("壁纸 ID {} 已保存到 {}", id, self.path.display());
                report.appended.push(id.clone());
            } else {
                info!("壁纸 ID {} 已存在，未保存", id);
                report.skipped += 1;
            }
        }

        if buffer.is_empty() {
            return Ok(report);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // 旧文件最后一行没有换行符时先补上，避免两个 ID 粘在一起
        if !self.ends_with_newline().await? {
            buffer.insert(0, '\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        Ok(report)
    }

    async fn ends_with_newline(&self) -> Result<bool> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes.last().is_none_or(|b| *b == b'\n')),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}
