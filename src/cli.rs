// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义所有子命令和参数

use clap::{Parser, Subcommand}; // Parser: 解析命令行参数的 trait; Subcommand: 定义子命令的 trait
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell
use std::path::PathBuf;

/// Wallhaven 批量壁纸下载工具
///
/// 解析 Wallhaven 搜索结果链接，收集壁纸 ID，
/// 并发下载原图到本地分类目录。
#[derive(Parser)]
#[command(name = "wallhaven-dl")]
#[command(version)] // 自动从 Cargo.toml 读取 version 字段
#[command(author)] // 自动从 Cargo.toml 读取 authors 字段（如有）
#[command(about = "Wallhaven 批量壁纸下载工具 — 按搜索链接收集壁纸并并发下载原图")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 按搜索链接下载壁纸
    ///
    /// 链接带 page 参数时会下载第 1 页到第 page 页，否则只下载第一页结果。
    ///
    /// 用法示例:
    ///   wallhaven-dl fetch 'https://wallhaven.cc/search?q=like%3A5gqdq1&page=3'
    ///   wallhaven-dl fetch 'https://wallhaven.cc/search?categories=010&sorting=toplist' --end-page 5
    ///   wallhaven-dl fetch '<LINK>' -w 8 --dir ~/Pictures/walls
    Fetch {
        /// Wallhaven 搜索结果链接
        link: String,

        /// 起始页码（默认 1）
        #[arg(long, value_name = "N")]
        start_page: Option<u32>,

        /// 终止页码（覆盖链接中的 page 参数）
        #[arg(long, value_name = "N")]
        end_page: Option<u32>,

        /// 同时下载的最大数量（默认取配置，配置默认 5）
        #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(usize))]
        workers: Option<usize>,

        /// 保存根目录（分类子目录建在它下面）
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 壁纸 ID 记录文件
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   wallhaven-dl completions zsh > ~/.zsh/completions/_wallhaven-dl
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   wallhaven-dl config show
    ///   wallhaven-dl config set api_key <KEY>
    ///   wallhaven-dl config set proxy http://127.0.0.1:18081
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// 配置管理操作
#[derive(Subcommand)]
pub enum ConfigAction {
    /// 查看当前所有配置简报
    Show,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
    /// 设置配置项的值 (支持: api_key, download_dir, proxy, max_workers)
    Set {
        /// 要设置的键
        key: String,
        /// 要设置的值
        value: String,
    },
}
