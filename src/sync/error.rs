use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("本地源目录不存在: {}", .0.display())]
    LocalSourceMissing(PathBuf),

    #[error("请求失败: {path} - {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API 错误: {path} (code {code}) - {message}")]
    Api {
        path: String,
        code: i64,
        message: String,
    },

    #[error("创建远端目录失败: {path} - {message}")]
    Mkdir { path: String, message: String },

    #[error("路径冲突: {path} 已存在同名文件，请重命名或删除后重试")]
    Conflict { path: String },

    #[error("目录创建被阻塞: {segment} (目标 {path}) - {message}")]
    BlockedSegment {
        path: String,
        segment: String,
        message: String,
    },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn http(path: impl Into<String>, source: reqwest::Error) -> Self {
        SyncError::Http {
            path: path.into(),
            source,
        }
    }

    /// 需要人工处理的冲突，不应自动重试
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }
}
