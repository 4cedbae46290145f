use crate::sync::client::ClientConfig;
use crate::sync::engine::TransferOptions;
use crate::sync::error::SyncError;
use crate::sync::lister::NameFilter;
use crate::sync::transfer::DEFAULT_RETRIES;
use crate::sync::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const LOCAL_CONFIG_FILE: &str = "alist_sync.json";
const PLACEHOLDER_SERVER: &str = "YOUR SERVER URL";
const PLACEHOLDER_TOKEN: &str = "YOUR AUTH TOKEN";

/// 默认配置文件：当前目录的 `alist_sync.json`，否则为用户配置目录下的 `alist-sync/config.json`
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("alist-sync").join("config.json"))
        .unwrap_or(local)
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

/// 单个方向的同步设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    /// 远端路径（下载源或上传目标）
    #[serde(default)]
    pub remote_path: String,
    /// 本地目录（下载目标或上传源）
    #[serde(default)]
    pub local_dir: PathBuf,
    /// 文件名过滤器，如 ".tif" 只同步 tif 文件
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// 最大递归深度，`null` 表示不限制
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl SyncSettings {
    pub fn options(&self) -> TransferOptions {
        TransferOptions {
            filter: NameFilter::new(self.file_pattern.as_deref()),
            recursive: self.recursive,
            max_depth: self.max_depth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    pub download: Option<SyncSettings>,
    pub upload: Option<SyncSettings>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "无法读取配置文件 {}: {}（可先运行 init 生成模板）",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SyncError::Config(format!("配置文件格式错误: {}", e)))
    }

    /// 命令行参数覆盖配置文件
    pub fn apply_overrides(&mut self, server: Option<String>, token: Option<String>) {
        if let Some(server) = server {
            self.server_url = server;
        }
        if let Some(token) = token {
            self.token = token;
        }
    }

    /// 校验服务器地址与认证令牌
    pub fn client(&self) -> Result<ClientConfig> {
        let server_url = self.server_url.trim();
        if server_url.is_empty() || server_url == PLACEHOLDER_SERVER {
            return Err(SyncError::Config("未配置服务器地址 server_url".to_string()));
        }
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "服务器地址必须以 http:// 或 https:// 开头: {}",
                server_url
            )));
        }
        let token = self.token.trim();
        if token.is_empty() || token == PLACEHOLDER_TOKEN {
            return Err(SyncError::Config("未配置认证令牌 token".to_string()));
        }

        Ok(ClientConfig {
            server_url: server_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }

    pub fn download_settings(&self) -> Result<&SyncSettings> {
        let settings = self
            .download
            .as_ref()
            .ok_or_else(|| SyncError::Config("缺少 download 配置段".to_string()))?;
        validate_settings("download", settings)?;
        Ok(settings)
    }

    /// 上传配置，本地源目录必须存在
    pub fn upload_settings(&self) -> Result<&SyncSettings> {
        let settings = self
            .upload
            .as_ref()
            .ok_or_else(|| SyncError::Config("缺少 upload 配置段".to_string()))?;
        validate_settings("upload", settings)?;
        if !settings.local_dir.exists() {
            return Err(SyncError::LocalSourceMissing(settings.local_dir.clone()));
        }
        Ok(settings)
    }

    pub fn template() -> Self {
        Self {
            server_url: PLACEHOLDER_SERVER.to_string(),
            token: PLACEHOLDER_TOKEN.to_string(),
            retries: DEFAULT_RETRIES,
            accept_invalid_certs: false,
            download: Some(SyncSettings {
                remote_path: "/remote/path".to_string(),
                local_dir: PathBuf::from("./downloads"),
                file_pattern: None,
                recursive: true,
                max_depth: None,
            }),
            upload: Some(SyncSettings {
                remote_path: "/remote/upload".to_string(),
                local_dir: PathBuf::from("./uploads"),
                file_pattern: None,
                recursive: true,
                max_depth: None,
            }),
        }
    }

    /// 写入配置模板；文件已存在且未指定 `force` 时报错
    pub fn write_template(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(SyncError::Config(format!(
                "配置文件已存在: {}（使用 --force 覆盖）",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&Self::template())?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn validate_settings(section: &str, settings: &SyncSettings) -> Result<()> {
    if settings.remote_path.trim().is_empty() {
        return Err(SyncError::Config(format!("{}.remote_path 未配置", section)));
    }
    if settings.local_dir.as_os_str().is_empty() {
        return Err(SyncError::Config(format!("{}.local_dir 未配置", section)));
    }
    Ok(())
}
