// logging.rs — 日志初始化模块
// 同一条日志同时输出到终端和追加写入的日志文件，均带时间戳和级别

use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// 未设置 `RUST_LOG` 时的过滤级别
pub const DEFAULT_LEVEL: &str = "info";

/// 安装全局 tracing subscriber
///
/// 过滤级别取自 `RUST_LOG`，未设置时为 [`DEFAULT_LEVEL`]。
pub fn init(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("日志初始化失败: {e}")))
}
