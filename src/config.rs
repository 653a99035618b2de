// config.rs — 配置管理模块
// 遵循 Unix 风格：优先从 ~/.config/wallhaven-dl/config.toml 读取配置
// 配置只在启动时加载一次，之后以 &AppConfig 的形式传给各个组件

use crate::error::{Error, Result};
use schemars::JsonSchema; // 引入用于生成 JSON Schema 的 trait
use serde::{Deserialize, Serialize}; // 引入序列化与反序列化 trait
use shellexpand::tilde; // 用于展开 ~ 和环境变量
use std::env; // 环境变量模块
use std::fs; // 文件系统模块
use std::path::{Path, PathBuf}; // 路径处理类型
use std::time::Duration;

/// 展开路径中的 ~ 和环境变量 ($HOME, $XDG_CONFIG_HOME 等)
/// 支持格式: ~/path, $HOME/path, ${HOME}/path
fn expand_path(path_str: &str) -> PathBuf {
    let expanded = tilde(path_str).into_owned();
    PathBuf::from(expanded)
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct ConfigFile {
    #[serde(default)]
    common: CommonConfig,
    #[serde(default)]
    source: SourceConfigs,
    #[serde(default)]
    network: NetworkConfig,
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct CommonConfig {
    /// 壁纸保存根目录 (支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME)
    /// 不配置则默认为 $HOME/Pictures/wallhaven
    download_dir: Option<String>,
    /// 壁纸 ID 记录文件，相对路径相对于当前工作目录，默认 wallpaper_ids.txt
    ledger_path: Option<String>,
    /// 日志文件，相对路径相对于当前工作目录，默认 wallhaven.log
    log_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct SourceConfigs {
    #[serde(default)]
    wallhaven: WallhavenConfig,
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct WallhavenConfig {
    api_key: Option<String>,
}

/// 网络相关配置：代理、重试、并发和翻页间隔
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct NetworkConfig {
    /// 转发代理地址（如 "http://127.0.0.1:18081"），所有请求都经过它
    #[serde(default)]
    pub proxy: Option<String>,
    /// 单个请求的最大尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 退避基数（秒），第 n 次重试前等待 backoff_factor * 2^n 秒
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// 同时下载的最大数量
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// 翻页间隔下限（秒）
    #[serde(default = "default_page_delay_min")]
    pub page_delay_min: f64,
    /// 翻页间隔上限（秒）
    #[serde(default = "default_page_delay_max")]
    pub page_delay_max: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            max_workers: default_max_workers(),
            page_delay_min: default_page_delay_min(),
            page_delay_max: default_page_delay_max(),
        }
    }
}

impl NetworkConfig {
    pub fn backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_factor.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// 翻页间隔区间，上下限写反时自动交换
    pub fn page_delay(&self) -> (Duration, Duration) {
        let min = self.page_delay_min.max(0.0);
        let max = self.page_delay_max.max(0.0);
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        (Duration::from_secs_f64(min), Duration::from_secs_f64(max))
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_factor() -> f64 {
    0.3
}
fn default_max_workers() -> usize {
    5
}
fn default_page_delay_min() -> f64 {
    1.2
}
fn default_page_delay_max() -> f64 {
    1.5
}

/// 应用全局配置项
#[derive(Debug)]
pub struct AppConfig {
    /// Wallhaven API Key (优先级：ENV > TOML)
    pub api_key: Option<String>,
    /// 壁纸保存根目录，分类子目录建在它下面
    pub download_dir: PathBuf,
    /// 壁纸 ID 记录文件
    pub ledger_path: PathBuf,
    /// 日志文件
    pub log_file: PathBuf,
    /// 网络配置
    pub network: NetworkConfig,
    /// 配置文件所在路径
    pub config_path: PathBuf,
}

impl AppConfig {
    /// 从 ~/.config/wallhaven-dl/config.toml 加载配置，并应用环境变量覆盖
    ///
    /// 配置文件不存在时使用默认值；文件存在但格式错误时直接返回错误。
    pub fn load() -> Result<Self> {
        let home = env::var("HOME").map_err(|_| Error::Config("无法获取 $HOME 环境变量".into()))?;
        let home_path = PathBuf::from(home);
        let config_path = home_path
            .join(".config")
            .join("wallhaven-dl")
            .join("config.toml");

        let config_file = Self::load_config_from_file(&config_path)?.unwrap_or_default();
        let mut config = Self::from_file(config_file, &home_path, config_path);

        // 优先级：环境变量 > 配置文件内容
        if let Ok(key) = env::var("WALLHAVEN_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(proxy) = env::var("WALLHAVEN_PROXY") {
            config.network.proxy = Some(proxy);
        }

        Ok(config)
    }

    /// 由解析后的文件内容构建配置，路径在这里统一展开
    fn from_file(config_file: ConfigFile, home_path: &Path, config_path: PathBuf) -> Self {
        // 壁纸目录：展开 ~ 和环境变量，相对路径则相对于 $HOME
        let download_dir = match config_file.common.download_dir {
            Some(dir_str) => {
                let p = expand_path(&dir_str);
                if p.is_absolute() { p } else { home_path.join(p) }
            }
            None => home_path.join("Pictures").join("wallhaven"),
        };

        let ledger_path = config_file
            .common
            .ledger_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from("wallpaper_ids.txt"));

        let log_file = config_file
            .common
            .log_file
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from("wallhaven.log"));

        Self {
            api_key: config_file.source.wallhaven.api_key,
            download_dir,
            ledger_path,
            log_file,
            network: config_file.network,
            config_path,
        }
    }

    /// 辅助函数：解析 TOML 配置文件
    /// 文件不存在返回 Ok(None)，内容非法返回错误
    fn load_config_from_file(path: &Path) -> Result<Option<ConfigFile>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// 取出 API Key，缺失或为空白时返回错误
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::MissingApiKey),
        }
    }

    /// 设置单个配置项 (支持: api_key, download_dir, proxy, max_workers)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_key" | "apikey" => self.api_key = Some(value.to_string()),
            "download_dir" | "dir" => self.download_dir = expand_path(value),
            "proxy" => {
                self.network.proxy = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "max_workers" | "workers" => {
                let workers: usize = value
                    .parse()
                    .map_err(|_| Error::Config(format!("max_workers 必须是正整数: {value}")))?;
                if workers == 0 {
                    return Err(Error::Config("max_workers 不能为 0".into()));
                }
                self.network.max_workers = workers;
            }
            _ => return Err(Error::Config(format!("未知配置项: {key}"))),
        }
        Ok(())
    }

    fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            common: CommonConfig {
                download_dir: Some(self.download_dir.to_string_lossy().to_string()),
                ledger_path: Some(self.ledger_path.to_string_lossy().to_string()),
                log_file: Some(self.log_file.to_string_lossy().to_string()),
            },
            source: SourceConfigs {
                wallhaven: WallhavenConfig {
                    api_key: self.api_key.clone(),
                },
            },
            network: self.network.clone(),
        }
    }

    /// 将配置保存回文件
    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(&self.to_config_file())
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }

    /// 获取配置文件的 JSON Schema
    pub fn get_schema() -> Result<String> {
        let schema = schemars::schema_for!(ConfigFile);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    /// 将当前配置转换为 TOML 字符串，API Key 打码
    pub fn to_toml(&self) -> String {
        let mut config_file = self.to_config_file();
        if let Some(key) = config_file.source.wallhaven.api_key.as_mut() {
            *key = mask_secret(key);
        }
        toml::to_string_pretty(&config_file)
            .unwrap_or_else(|_| "# Error serializing config".to_string())
    }
}

/// 只保留前 4 位，其余用 * 代替
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    let hidden = secret.chars().count().saturating_sub(4);
    format!("{}{}", visible, "*".repeat(hidden))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ConfigFile {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn defaults_when_file_is_empty() {
        let home = Path::new("/home/tester");
        let config = AppConfig::from_file(parse(""), home, home.join("config.toml"));

        assert_eq!(config.download_dir, home.join("Pictures").join("wallhaven"));
        assert_eq!(config.ledger_path, PathBuf::from("wallpaper_ids.txt"));
        assert_eq!(config.network.max_retries, 3);
        assert_eq!(config.network.max_workers, 5);
        assert_eq!(config.network.backoff(), Duration::from_millis(300));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn reads_nested_sections() {
        let home = Path::new("/home/tester");
        let content = r#"
            [common]
            download_dir = "walls"

            [source.wallhaven]
            api_key = "abcdef123"

            [network]
            proxy = "http://127.0.0.1:18081"
            max_workers = 8
        "#;
        let config = AppConfig::from_file(parse(content), home, home.join("config.toml"));

        assert_eq!(config.download_dir, home.join("walls"));
        assert_eq!(config.require_api_key().unwrap(), "abcdef123");
        assert_eq!(config.network.proxy.as_deref(), Some("http://127.0.0.1:18081"));
        assert_eq!(config.network.max_workers, 8);
        assert_eq!(config.network.max_retries, 3);
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let home = Path::new("/home/tester");
        let content = "[source.wallhaven]\napi_key = \"   \"\n";
        let config = AppConfig::from_file(parse(content), home, home.join("config.toml"));

        assert!(matches!(config.require_api_key(), Err(Error::MissingApiKey)));
    }

    #[test]
    fn malformed_file_is_an_error_and_missing_file_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load_config_from_file(&missing).unwrap().is_none());

        let broken = dir.path().join("config.toml");
        fs::write(&broken, "[network\nmax_workers = ").unwrap();
        assert!(matches!(
            AppConfig::load_config_from_file(&broken),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn swapped_page_delay_bounds_are_normalised() {
        let network = NetworkConfig {
            page_delay_min: 2.0,
            page_delay_max: 1.0,
            ..NetworkConfig::default()
        };
        let (min, max) = network.page_delay();
        assert!(min <= max);
    }

    #[test]
    fn set_validates_worker_count() {
        let home = Path::new("/home/tester");
        let mut config = AppConfig::from_file(parse(""), home, home.join("config.toml"));

        config.set("max_workers", "3").unwrap();
        assert_eq!(config.network.max_workers, 3);
        assert!(config.set("max_workers", "0").is_err());
        assert!(config.set("colour", "red").is_err());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("wallhaven-dl").join("config.toml");
        let mut config = AppConfig::from_file(parse(""), dir.path(), config_path.clone());
        config.set("api_key", "secret-key").unwrap();
        config.set("proxy", "http://localhost:8080").unwrap();
        config.save().unwrap();

        let reloaded = AppConfig::load_config_from_file(&config_path).unwrap().unwrap();
        let reloaded = AppConfig::from_file(reloaded, dir.path(), config_path);
        assert_eq!(reloaded.api_key.as_deref(), Some("secret-key"));
        assert_eq!(reloaded.network.proxy.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn dump_masks_api_key() {
        assert_eq!(mask_secret("abcdef"), "abcd**");
        assert_eq!(mask_secret("ab"), "ab");
    }
}
