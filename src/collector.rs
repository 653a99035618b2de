// collector.rs — 壁纸 ID 收集模块
// 单次模式：只请求一次搜索接口
// 分页模式：按页码顺序逐页请求，每页之间随机休眠，避免触发服务端限流
// 这里不做去重，去重交给 ledger

use crate::error::{Error, Result};
use crate::query::SearchQuery;
use crate::source::WallpaperSource;
use rand::Rng;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{error, info};

pub struct IdCollector<'a> {
    source: &'a dyn WallpaperSource,
    /// 翻页间隔的随机区间
    page_delay: (Duration, Duration),
}

impl<'a> IdCollector<'a> {
    pub fn new(source: &'a dyn WallpaperSource, page_delay: (Duration, Duration)) -> Self {
        Self { source, page_delay }
    }

    /// 收集壁纸 ID；给出页码区间时逐页请求，否则只请求一次
    pub async fn collect(
        &self,
        query: &SearchQuery,
        pages: Option<RangeInclusive<u32>>,
    ) -> Vec<String> {
        match pages {
            Some(pages) => self.collect_paginated(query, pages).await,
            None => self.collect_single(query).await,
        }
    }

    /// 单次请求，失败返回空列表
    pub async fn collect_single(&self, query: &SearchQuery) -> Vec<String> {
        match self.source.search_ids(query).await {
            Ok(ids) => {
                info!("壁纸 ID 获取成功，共 {} 个", ids.len());
                ids
            }
            Err(e) => {
                error!("请求失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 逐页请求，结果按页码顺序拼接；某一页失败只跳过该页
    pub async fn collect_paginated(
        &self,
        query: &SearchQuery,
        pages: RangeInclusive<u32>,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        let mut page_query = query.clone();
        let last = *pages.end();

        for page in pages {
            page_query.page = Some(page);

            match self.source.search_ids(&page_query).await {
                Ok(page_ids) => {
                    info!("第 {} 页的壁纸 ID 获取成功，共 {} 个", page, page_ids.len());
                    ids.extend(page_ids);
                }
                Err(e) => {
                    error!("请求第 {} 页时失败: {}", page, e);
                }
            }

            if page < last {
                tokio::time::sleep(self.next_delay()).await;
            }
        }

        ids
    }

    fn next_delay(&self) -> Duration {
        let (min, max) = self.page_delay;
        if min >= max {
            return min;
        }
        let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// 决定翻页区间
///
/// 命令行给了终止页就用它，否则用链接里的 page；两者都没有时，
/// 只给了起始页则只取那一页，什么都没给则不翻页。
/// 起始页大于终止页时返回错误。
pub fn page_range(
    start_page: Option<u32>,
    end_page: Option<u32>,
    link_page: Option<u32>,
) -> Result<Option<RangeInclusive<u32>>> {
    let range = match (start_page, end_page.or(link_page)) {
        (start, Some(end)) => start.unwrap_or(1)..=end,
        (Some(start), None) => start..=start,
        (None, None) => return Ok(None),
    };
    if range.is_empty() {
        return Err(Error::InvalidPageRange {
            start: *range.start(),
            end: *range.end(),
        });
    }
    Ok(Some(range))
}

/// 按首次出现的顺序去重
pub fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
