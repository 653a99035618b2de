// error.rs — 错误类型模块
// 使用 thiserror 派生 Display / Error，单条壁纸的失败只记录日志，启动阶段的错误向上传播

use std::path::PathBuf;
use thiserror::Error;

/// 本工具统一使用的 Result 别名
pub type Result<T> = std::result::Result<T, Error>;

/// 下载流程中可能出现的所有错误
#[derive(Debug, Error)]
pub enum Error {
    /// 配置文件存在但无法解析，或写回失败
    #[error("配置错误: {0}")]
    Config(String),

    /// 未配置 Wallhaven API Key（环境变量和配置文件都没有）
    #[error("缺少 Wallhaven API Key，请设置 WALLHAVEN_API_KEY 或 [source.wallhaven].api_key")]
    MissingApiKey,

    /// 输入的搜索链接无法使用
    #[error("无效的搜索链接 {link}: {reason}")]
    InvalidLink { link: String, reason: String },

    /// 起始页大于终止页
    #[error("无效的页码范围: {start}..={end}")]
    InvalidPageRange { start: u32, end: u32 },

    /// 原图地址的最后一段为空，无法决定保存的文件名
    #[error("原图地址中没有文件名: {0}")]
    NoFileName(String),

    /// 传输层错误（超时、连接失败、DNS 等）
    #[error("网络错误: {0}")]
    Http(#[from] reqwest::Error),

    /// 服务端返回了非 2xx 状态码
    #[error("请求 {url} 返回状态码 {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// 重试次数耗尽，放弃该请求
    #[error("请求 {url} 已重试 {attempts} 次，放弃")]
    Exhausted { url: String, attempts: u32 },

    /// 响应体不是预期的 JSON 结构
    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 写入的字节数和 Content-Length 不一致
    #[error("文件 {} 大小不符：期望 {expected} 字节，实际 {actual} 字节", path.display())]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}
