// source/mod.rs — 壁纸源模块入口
// 定义搜索和详情解析的抽象接口，ID 收集器和并发下载器只依赖这个 Trait
pub mod wallhaven;

use crate::error::Result;
use crate::query::SearchQuery;
use async_trait::async_trait; // 异步 Trait 支持宏

/// 壁纸源的抽象 Trait
///
/// # 异步 Trait 说明
/// Trait 对象需要在多个下载任务之间共享，这里使用 `async_trait`
/// 让返回的 Future 满足 `Send`。
#[async_trait]
pub trait WallpaperSource: Send + Sync {
    /// 按查询条件请求一次搜索接口，返回本次结果中所有壁纸的 ID
    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>>;

    /// 请求详情接口，把壁纸 ID 解析为原图的直接下载地址
    async fn resolve(&self, id: &str) -> Result<String>;
}
