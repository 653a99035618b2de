// http.rs — 带重试的 HTTP 请求执行器
// 所有上层组件（搜索、详情、下载）都通过它发请求：
//   - 最多尝试 max_retries 次
//   - 429 和其它失败都按 backoff * 2^attempt 退避后重试
//   - 次数耗尽返回 Error::Exhausted，由调用方决定跳过

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// 带重试和退避的 HTTP 执行器
///
/// 内部的 `reqwest::Client` 维护连接池，整个进程共用一个执行器即可。
/// 响应体有两种取法：`get_bytes` 在重试循环内读完整个响应体，读取失败也会重试；
/// `get_stream` 只确认状态码，响应体留给调用方逐块读取。
pub struct HttpExecutor {
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

impl HttpExecutor {
    /// 按网络配置创建执行器，配置了代理时所有请求都走代理
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("wallhaven-dl/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = network.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            max_retries: network.max_retries.max(1),
            backoff: network.backoff(),
        })
    }

    /// 第 attempt 次（从 0 开始）失败后的等待时间，溢出时取 Duration::MAX
    fn backoff_for(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        2u32.checked_pow(attempt)
            .and_then(|factor| self.backoff.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// 按重试策略反复执行 op，直到成功或次数耗尽
    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..self.max_retries {
            match op().await {
                Ok(value) => {
                    info!(url, attempt = attempt + 1, "请求成功");
                    return Ok(value);
                }
                Err(Error::Status { status, .. }) if status == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(url, attempt = attempt + 1, "收到 429 错误，触发限流");
                }
                Err(e) => {
                    error!(url, attempt = attempt + 1, "请求失败: {}", e);
                }
            }

            if attempt + 1 < self.max_retries {
                let wait = self.backoff_for(attempt);
                info!("等待 {:.2} 秒后重试...", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }

        error!(url, "请求失败，已重试 {} 次，放弃。", self.max_retries);
        Err(Error::Exhausted {
            url: url.to_string(),
            attempts: self.max_retries,
        })
    }

    /// 发出一次请求，非 2xx 状态码视为失败
    ///
    /// `query` 会被编码进 URL 查询串；重复的 key 会原样重复发送。
    async fn send(&self, url: &str, query: Option<&[(String, String)]>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(params) = query {
            request = request.query(params);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    /// 缓冲模式请求，返回完整的响应体
    pub async fn get_bytes(
        &self,
        url: &str,
        query: Option<&[(String, String)]>,
    ) -> Result<Vec<u8>> {
        self.with_retry(url, move || async move {
            let response = self.send(url, query).await?;
            Ok::<_, Error>(response.bytes().await?.to_vec())
        })
        .await
    }

    /// 缓冲模式请求并把响应体解析为 JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: Option<&[(String, String)]>,
    ) -> Result<T> {
        let body = self.get_bytes(url, query).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// 流式模式请求，返回尚未读取响应体的 Response
    pub async fn get_stream(&self, url: &str) -> Result<Response> {
        self.with_retry(url, move || self.send(url, None)).await
    }
}
