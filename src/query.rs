// query.rs — 搜索链接解析模块
// 把 https://wallhaven.cc/search?... 这样的链接拆成查询参数，
// 再整理成带类型字段的 SearchQuery，未识别的参数原样保留

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use url::Url;

/// 单个查询参数的值：出现一次为 Single，出现多次为按出现顺序排列的 Multi
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// 出现一次时返回该值
    pub fn as_single(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::Multi(_) => None,
        }
    }

    fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(v) => vec![v.as_str()],
            ParamValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// 解析链接中的查询串
///
/// 空值参数会被丢弃；链接本身无法解析时返回空表。
pub fn parse_params(link: &str) -> BTreeMap<String, ParamValue> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let Ok(url) = Url::parse(link.trim()) else {
        return BTreeMap::new();
    };

    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        grouped
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                ParamValue::Single(values.remove(0))
            } else {
                ParamValue::Multi(values)
            };
            (key, value)
        })
        .collect()
}

/// Wallhaven 搜索条件
///
/// - `purity`: 100/010/001 等 (sfw/sketchy/nsfw)
/// - `categories`: 100/010/001 等 (general/anime/people)
/// - `sorting`: date_added / relevance / random / views / favorites / toplist
/// - `order`: desc / asc
/// - `ai_art_filter`: true 表示不显示 AI 生成的图片
/// - `page`: 链接里的页码，作为翻页的终止页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub purity: Option<String>,
    pub categories: Option<String>,
    pub sorting: Option<String>,
    pub order: Option<String>,
    pub ai_art_filter: Option<bool>,
    pub page: Option<u32>,
    /// 其它未识别的参数（以及出现多次的已知参数）
    pub extra: BTreeMap<String, ParamValue>,
}

impl SearchQuery {
    /// 从搜索链接构建查询条件
    pub fn from_link(link: &str) -> Result<Self> {
        if Url::parse(link.trim()).is_err() {
            return Err(Error::InvalidLink {
                link: link.to_string(),
                reason: "不是合法的 URL".into(),
            });
        }
        Self::from_params(link, parse_params(link))
    }

    fn from_params(link: &str, params: BTreeMap<String, ParamValue>) -> Result<Self> {
        let mut query = SearchQuery::default();

        for (key, value) in params {
            let Some(single) = value.as_single().map(str::to_string) else {
                query.extra.insert(key, value);
                continue;
            };

            match key.as_str() {
                "q" => query.q = Some(single),
                "purity" => query.purity = Some(single),
                "categories" => query.categories = Some(single),
                "sorting" => query.sorting = Some(single),
                "order" => query.order = Some(single),
                "ai_art_filter" if single == "1" || single == "0" => {
                    query.ai_art_filter = Some(single == "1")
                }
                "page" => {
                    let page = single.parse::<u32>().map_err(|_| Error::InvalidLink {
                        link: link.to_string(),
                        reason: format!("page 参数不是正整数: {single}"),
                    })?;
                    query.page = Some(page);
                }
                _ => {
                    query.extra.insert(key, value);
                }
            }
        }

        Ok(query)
    }

    /// 转换为请求参数列表，多值参数展开为重复的 key
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let known = [
            ("q", self.q.as_deref()),
            ("purity", self.purity.as_deref()),
            ("categories", self.categories.as_deref()),
            ("sorting", self.sorting.as_deref()),
            ("order", self.order.as_deref()),
        ];
        for (key, value) in known {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
        if let Some(ai) = self.ai_art_filter {
            pairs.push(("ai_art_filter".to_string(), if ai { "1" } else { "0" }.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        for (key, value) in &self.extra {
            for v in value.values() {
                pairs.push((key.clone(), v.to_string()));
            }
        }
        pairs
    }

    /// 根据 categories 参数决定保存的子目录
    pub fn folder_name(&self) -> &'static str {
        match self.categories.as_deref() {
            Some("010") => "anime",
            Some("001") => "people",
            _ => "general",
        }
    }
}
