// batch.rs — 并发下载调度
// 每个壁纸 ID 一个任务：先查详情拿到原图地址，再下载到目标目录
// 用 Semaphore 限制同时运行的任务数，JoinSet 等待全部任务结束
// 单个任务失败（包括 panic）只记录到结果里，不影响其它任务

use crate::downloader::{DownloadOutcome, Downloader};
use crate::source::WallpaperSource;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// 单个 ID 的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Downloaded(PathBuf),
    Skipped(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub status: ItemStatus,
}

/// 一批下载的汇总，outcomes 与输入 ID 一一对应且顺序一致
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Downloaded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed(_)))
    }
}

pub struct BatchRunner {
    source: Arc<dyn WallpaperSource>,
    downloader: Downloader,
    max_workers: usize,
}

impl BatchRunner {
    pub fn new(source: Arc<dyn WallpaperSource>, downloader: Downloader, max_workers: usize) -> Self {
        Self {
            source,
            downloader,
            max_workers: max_workers.max(1),
        }
    }

    /// 并发处理所有 ID，全部结束后返回
    pub async fn run_all(&self, ids: &[String], dir: &Path) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        // 任务 ID -> 输入下标，异常退出的任务也能找回对应的壁纸
        let mut indices = HashMap::with_capacity(ids.len());

        for (index, id) in ids.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let downloader = self.downloader.clone();
            let dir = dir.to_path_buf();
            let id = id.clone();

            let handle = tasks.spawn(async move {
                // Semaphore 不会被关闭，acquire 只会成功
                let _permit = semaphore.acquire_owned().await.ok();
                process(source.as_ref(), &downloader, &id, &dir).await
            });
            indices.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ItemStatus>> = vec![None; ids.len()];

        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, status) = match joined {
                Ok((task_id, status)) => (task_id, status),
                Err(e) => {
                    error!("下载任务异常退出: {}", e);
                    (e.id(), ItemStatus::Failed(join_failure(e)))
                }
            };
            if let Some(&index) = indices.get(&task_id) {
                slots[index] = Some(status);
            }
        }

        let outcomes = ids
            .iter()
            .zip(slots)
            .map(|(id, slot)| ItemOutcome {
                id: id.clone(),
                status: slot.unwrap_or_else(|| ItemStatus::Failed("任务未返回结果".to_string())),
            })
            .collect();

        BatchReport { outcomes }
    }
}

/// 把 JoinError 转成失败原因，panic 时带上 panic 信息
fn join_failure(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    format!("任务 panic: {message}")
}

/// 单个 ID：查详情 -> 下载
async fn process(
    source: &dyn WallpaperSource,
    downloader: &Downloader,
    id: &str,
    dir: &Path,
) -> ItemStatus {
    let location = match source.resolve(id).await {
        Ok(location) => {
            info!("原图 URL: {}", location);
            location
        }
        Err(e) => {
            error!("壁纸 {} 未能获取原图 URL: {}", id, e);
            return ItemStatus::Failed(e.to_string());
        }
    };

    match downloader.fetch(&location, dir).await {
        Ok(DownloadOutcome::Downloaded { path, bytes }) => {
            debug!(id, bytes, "下载完成");
            ItemStatus::Downloaded(path)
        }
        Ok(DownloadOutcome::Skipped { path }) => ItemStatus::Skipped(path),
        Err(e) => {
            error!("下载失败: {} ({})", location, e);
            ItemStatus::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::error::{Error, Result};
    use crate::http::HttpExecutor;
    use crate::query::SearchQuery;
    use async_trait::async_trait;
    use indicatif::{MultiProgress, ProgressDrawTarget};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// 把 ID 映射到 mock 服务上的图片地址，并记录同时在跑的任务数
    struct MockSource {
        base: String,
        unresolvable: HashSet<String>,
        panicking: HashSet<String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockSource {
        fn new(base: String) -> Self {
            Self {
                base,
                unresolvable: HashSet::new(),
                panicking: HashSet::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WallpaperSource for MockSource {
        async fn search_ids(&self, _query: &SearchQuery) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn resolve(&self, id: &str) -> Result<String> {
            if self.panicking.contains(id) {
                panic!("resolver crashed on {id}");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.unresolvable.contains(id) {
                return Err(Error::Exhausted {
                    url: format!("/w/{id}"),
                    attempts: 3,
                });
            }
            Ok(format!("{}/full/{}/wallhaven-{}.jpg", self.base, &id[..2], id))
        }
    }

    async fn image_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/full/.*/wallhaven-bad.*\.jpg$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/full/.*\.jpg$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;
        server
    }

    fn runner(source: Arc<MockSource>, workers: usize) -> BatchRunner {
        let network = NetworkConfig {
            backoff_factor: 0.001,
            ..NetworkConfig::default()
        };
        let http = Arc::new(HttpExecutor::new(&network).unwrap());
        let downloader = Downloader::new(
            http,
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        );
        BatchRunner::new(source, downloader, workers)
    }

    fn make_ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("id{i:04}")).collect()
    }

    #[tokio::test]
    async fn every_id_gets_exactly_one_outcome() {
        let server = image_server().await;

        for workers in [1, 2, 5] {
            let source = Arc::new(MockSource::new(server.uri()));
            let dir = tempfile::tempdir().unwrap();
            let ids = make_ids(12);

            let report = runner(Arc::clone(&source), workers)
                .run_all(&ids, dir.path())
                .await;

            assert_eq!(report.outcomes.len(), ids.len());
            let reported: Vec<_> = report.outcomes.iter().map(|o| o.id.clone()).collect();
            assert_eq!(reported, ids);
            assert_eq!(report.downloaded(), 12);
            assert!(source.peak.load(Ordering::SeqCst) <= workers);
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 12);
        }
    }

    #[tokio::test]
    async fn failures_do_not_affect_siblings() {
        let server = image_server().await;
        let mut source = MockSource::new(server.uri());
        source.unresolvable.insert("id0001".to_string());
        let source = Arc::new(source);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wallhaven-id0002.jpg"), b"kept").unwrap();
        let ids = vec![
            "id0000".to_string(),
            "id0001".to_string(),
            "id0002".to_string(),
            "bad001".to_string(),
        ];

        let report = runner(source, 2).run_all(&ids, dir.path()).await;

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 2);
        assert!(matches!(report.outcomes[1].status, ItemStatus::Failed(_)));
        assert!(matches!(report.outcomes[3].status, ItemStatus::Failed(_)));
        assert_eq!(
            std::fs::read(dir.path().join("wallhaven-id0002.jpg")).unwrap(),
            b"kept"
        );
    }

    #[tokio::test]
    async fn panicking_unit_is_collected() {
        let server = image_server().await;
        let mut source = MockSource::new(server.uri());
        source.panicking.insert("id0001".to_string());
        let source = Arc::new(source);

        let dir = tempfile::tempdir().unwrap();
        let ids = make_ids(3);

        let report = runner(source, 3).run_all(&ids, dir.path()).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.downloaded(), 2);
        assert!(matches!(report.outcomes[1].status, ItemStatus::Failed(_)));
    }

    #[tokio::test]
    async fn panics_are_reported_against_their_own_ids() {
        let server = image_server().await;
        let mut source = MockSource::new(server.uri());
        source.panicking.insert("id0001".to_string());
        source.panicking.insert("id0003".to_string());
        source.panicking.insert("id0004".to_string());
        let source = Arc::new(source);

        let dir = tempfile::tempdir().unwrap();
        let ids = make_ids(6);

        let report = runner(source, 4).run_all(&ids, dir.path()).await;

        assert_eq!(report.downloaded(), 3);
        assert_eq!(report.failed(), 3);
        for outcome in &report.outcomes {
            match &outcome.status {
                ItemStatus::Failed(reason) => assert!(
                    reason.contains(&format!("resolver crashed on {}", outcome.id)),
                    "{} reported {reason}",
                    outcome.id
                ),
                ItemStatus::Downloaded(_) => {
                    assert!(!["id0001", "id0003", "id0004"].contains(&outcome.id.as_str()))
                }
                ItemStatus::Skipped(_) => panic!("nothing should be skipped"),
            }
        }
    }

    #[tokio::test]
    async fn empty_batch_returns_immediately() {
        let server = image_server().await;
        let source = Arc::new(MockSource::new(server.uri()));
        let dir = tempfile::tempdir().unwrap();

        let report = runner(source, 5).run_all(&[], dir.path()).await;

        assert!(report.outcomes.is_empty());
    }
}
