use crate::sync::error::SyncError;
use crate::sync::path;
use crate::sync::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use reqwest::header::{
    HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
    USER_AGENT,
};
use reqwest::{Body, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 alist-sync";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// 远端目录中的一个条目，每次列目录时重新生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
        }
    }
}

/// 远端创建目录的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirOutcome {
    pub success: bool,
    pub message: String,
}

impl MkdirOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 远端文件系统的最小接口：列目录与创建目录
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;
    async fn mkdir(&self, path: &str) -> MkdirOutcome;
}

/// 客户端连接配置，显式传给所有远端调用
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub token: String,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    content: Option<Vec<RemoteEntry>>,
}

/// AList 兼容 HTTP API 客户端
#[derive(Debug, Clone)]
pub struct AListClient {
    http: Client,
    server_url: String,
}

impl AListClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&config.token)
                .map_err(|e| SyncError::Config(format!("无效的认证令牌: {}", e)))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SyncError::http(config.server_url.as_str(), e))?;

        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.server_url, endpoint)
    }

    /// 文件直链：`<server>/d/<逐段编码的路径>`
    pub fn download_url(&self, remote_path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|e| SyncError::Config(format!("无效的服务器地址 {}: {}", self.server_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SyncError::Config(format!("服务器地址不能作为基础 URL: {}", self.server_url)))?;
            segments.pop_if_empty().push("d");
            for segment in path::normalize(remote_path).split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// 流式下载到 `dest`；`dest` 已有部分内容时通过 Range 续传
    ///
    /// 服务端返回的 `Content-Range` 与本地部分文件对不上时，丢弃部分文件从头下载。
    pub async fn download_to(
        &self,
        remote_path: &str,
        dest: &Path,
        progress: &ProgressBar,
    ) -> Result<()> {
        let url = self.download_url(remote_path)?;

        let (mut response, append, start) = loop {
            let offset = tokio::fs::metadata(dest)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            debug!(%url, offset, "开始下载");

            let mut request = self.http.get(url.clone());
            if offset > 0 {
                request = request.header(RANGE, format!("bytes={}-", offset));
            }

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::http(remote_path, e))?;

            let range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range);

            match response.status() {
                StatusCode::PARTIAL_CONTENT => match range {
                    Some((Some(start), _)) if start == offset && offset > 0 => {
                        break (response, true, offset)
                    }
                    Some((Some(0), _)) => break (response, false, 0),
                    _ => {
                        return Err(SyncError::Api {
                            path: remote_path.to_string(),
                            code: 206,
                            message: format!("续传位置不匹配: 请求 {} 字节起", offset),
                        });
                    }
                },
                StatusCode::RANGE_NOT_SATISFIABLE if offset > 0 => {
                    if matches!(range, Some((_, Some(total))) if total == offset) {
                        // 本地部分文件已经完整
                        return Ok(());
                    }
                    warn!(path = remote_path, offset, "本地部分文件与远端不一致，重新下载");
                    tokio::fs::remove_file(dest).await?;
                }
                s if s.is_success() => break (response, false, 0),
                s => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(SyncError::Api {
                        path: remote_path.to_string(),
                        code: i64::from(s.as_u16()),
                        message: error_text,
                    });
                }
            }
        };

        if let Some(len) = response.content_length() {
            progress.set_length(start + len);
        }
        progress.set_position(start);

        let mut file = if append {
            tokio::fs::OpenOptions::new().append(true).open(dest).await?
        } else {
            tokio::fs::File::create(dest).await?
        };

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SyncError::http(remote_path, e))?
        {
            file.write_all(&chunk).await?;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;

        Ok(())
    }

    /// 上传本地文件到远端完整路径
    pub async fn put_file(&self, local: &Path, remote_path: &str) -> Result<()> {
        let file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();
        let encoded = encode_path(remote_path)?;
        debug!(local = %local.display(), remote = remote_path, size, "开始上传");

        let response = self
            .http
            .put(self.api_url("/api/fs/put"))
            .header("File-Path", encoded)
            .header("As-Task", "false")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .send()
            .await
            .map_err(|e| SyncError::http(remote_path, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                path: remote_path.to_string(),
                code: i64::from(status.as_u16()),
                message: error_text,
            });
        }

        let result: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SyncError::http(remote_path, e))?;
        if result.code != 200 {
            return Err(SyncError::Api {
                path: remote_path.to_string(),
                code: result.code,
                message: result.message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteFs for AListClient {
    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let body = json!({
            "path": path,
            "password": "",
            "page": 1,
            "per_page": 0,
            "refresh": false,
        });

        let response = self
            .http
            .post(self.api_url("/api/fs/list"))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::http(path, e))?;

        let result: ApiResponse<ListData> = response
            .json()
            .await
            .map_err(|e| SyncError::http(path, e))?;

        if result.code != 200 {
            return Err(SyncError::Api {
                path: path.to_string(),
                code: result.code,
                message: result.message,
            });
        }

        Ok(result
            .data
            .and_then(|d| d.content)
            .unwrap_or_default())
    }

    async fn mkdir(&self, path: &str) -> MkdirOutcome {
        let response = match self
            .http
            .post(self.api_url("/api/fs/mkdir"))
            .json(&json!({ "path": path }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return MkdirOutcome::failed(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return MkdirOutcome::failed(format!("{} - {}", status, error_text));
        }

        match response.json::<ApiResponse<serde_json::Value>>().await {
            Ok(result) if result.code == 200 => MkdirOutcome::ok(),
            Ok(result) => MkdirOutcome::failed(result.message),
            Err(e) => MkdirOutcome::failed(e.to_string()),
        }
    }
}

/// 解析 `bytes <起>-<止>/<总长>` 或 `bytes */<总长>`，返回（起始位置，总长度）
fn parse_content_range(value: &str) -> Option<(Option<u64>, Option<u64>)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let total = total.trim().parse().ok();
    let start = match range.trim() {
        "*" => None,
        range => Some(range.split_once('-')?.0.trim().parse().ok()?),
    };
    Some((start, total))
}

/// 逐段百分号编码的逻辑路径，用于 `File-Path` 请求头
pub fn encode_path(remote_path: &str) -> Result<String> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| SyncError::Config(e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| SyncError::Config("无法编码路径".to_string()))?;
        segments.clear();
        for segment in path::normalize(remote_path).split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }
    Ok(url.path().to_string())
}
