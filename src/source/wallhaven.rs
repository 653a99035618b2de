// wallhaven.rs — Wallhaven API 异步客户端模块
// 负责与 Wallhaven API 交互：搜索壁纸 ID、查询壁纸详情
// 所有请求都交给 HttpExecutor，重试和限流处理不在这一层

use super::WallpaperSource;
use crate::error::Result;
use crate::http::HttpExecutor;
use crate::query::SearchQuery;
use async_trait::async_trait;
use serde::Deserialize; // 反序列化 trait，用于将 JSON 转为 Rust 结构体
use std::sync::Arc;

/// Wallhaven API 搜索响应的顶层结构
///
/// 只提取需要的字段，JSON 中多余的字段会被 serde 自动忽略
#[derive(Deserialize, Debug)]
pub struct SearchResponse {
    /// 搜索结果列表，Wallhaven API 每页最多返回 24 条结果
    pub data: Vec<SearchItem>,
}

#[derive(Deserialize, Debug)]
pub struct SearchItem {
    /// 壁纸唯一标识符（如 "94x38z"）
    pub id: String,
}

/// `/w/{id}` 详情接口的响应
#[derive(Deserialize, Debug)]
pub struct DetailResponse {
    pub data: Detail,
}

#[derive(Deserialize, Debug)]
pub struct Detail {
    /// 壁纸原图的直接下载 URL
    /// 格式如：https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg
    pub path: String,
}

/// Wallhaven API 异步客户端
pub struct WallhavenClient {
    /// 共享的重试执行器
    http: Arc<HttpExecutor>,

    /// API 基础 URL
    base_url: String,

    /// API Key，启动时已校验非空
    api_key: String,
}

impl WallhavenClient {
    pub fn new(http: Arc<HttpExecutor>, api_key: String) -> Self {
        Self::with_base_url(http, api_key, "https://wallhaven.cc/api/v1")
    }

    /// 指定 API 地址（测试时指向本地 mock 服务）
    pub fn with_base_url(http: Arc<HttpExecutor>, api_key: String, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn api_key_pair(&self) -> (String, String) {
        ("apikey".to_string(), self.api_key.clone())
    }
}

#[async_trait]
impl WallpaperSource for WallhavenClient {
    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>> {
        let url = format!("{}/search", self.base_url);

        let mut params = query.to_pairs();
        params.push(self.api_key_pair());

        let response: SearchResponse = self.http.get_json(&url, Some(&params)).await?;

        Ok(response.data.into_iter().map(|w| w.id).collect())
    }

    async fn resolve(&self, id: &str) -> Result<String> {
        let url = format!("{}/w/{}", self.base_url, id);
        let params = [self.api_key_pair()];

        let response: DetailResponse = self.http.get_json(&url, Some(&params)).await?;

        Ok(response.data.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::error::Error;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WallhavenClient {
        let network = NetworkConfig {
            backoff_factor: 0.001,
            ..NetworkConfig::default()
        };
        let http = Arc::new(HttpExecutor::new(&network).unwrap());
        WallhavenClient::with_base_url(http, "test-key".into(), &server.uri())
    }

    #[tokio::test]
    async fn search_sends_query_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "like:5gqdq1"))
            .and(query_param("page", "2"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "94x38z", "path": "https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg"},
                    {"id": "k7q1pd", "resolution": "3840x2160"}
                ],
                "meta": {"current_page": 2, "last_page": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = SearchQuery::from_link("https://wallhaven.cc/search?q=like%3A5gqdq1").unwrap();
        query.page = Some(2);

        let ids = client(&server).search_ids(&query).await.unwrap();
        assert_eq!(ids, vec!["94x38z", "k7q1pd"]);
    }

    #[tokio::test]
    async fn resolve_returns_original_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/94x38z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "94x38z",
                    "path": "https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg"
                }
            })))
            .mount(&server)
            .await;

        let location = client(&server).resolve("94x38z").await.unwrap();
        assert_eq!(location, "https://w.wallhaven.cc/full/94/wallhaven-94x38z.jpg");
    }

    #[tokio::test]
    async fn resolve_failures_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(matches!(
            client.resolve("missing").await,
            Err(Error::Exhausted { .. })
        ));
        assert!(matches!(client.resolve("empty").await, Err(Error::Decode(_))));
    }
}
