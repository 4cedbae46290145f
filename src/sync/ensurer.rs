use crate::sync::client::RemoteFs;
use crate::sync::error::SyncError;
use crate::sync::path;
use crate::sync::Result;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// 已知的并发写入类错误，等待后重新确认一次
fn transient_error() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)being (written|uploaded|modified)|is busy|resource busy|locked|try again|正在(写入|上传)")
            .expect("valid transient error pattern")
    })
}

pub fn is_transient_mkdir_error(message: &str) -> bool {
    transient_error().is_match(message)
}

/// 远端路径的存在状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Directory,
    File,
    Absent,
}

/// 确保远端目录存在：自上而下补齐祖先目录
pub struct DirectoryEnsurer<'a> {
    remote: &'a dyn RemoteFs,
    retry_delay: Duration,
}

impl<'a> DirectoryEnsurer<'a> {
    pub fn new(remote: &'a dyn RemoteFs) -> Self {
        Self {
            remote,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// 通过列出父目录判断路径是否存在以及类型；根目录始终视为目录
    pub async fn probe(&self, target: &str) -> Presence {
        let target = path::normalize(target);
        let Some(parent) = path::parent(&target) else {
            return Presence::Directory;
        };
        let name = path::basename(&target);

        let entries = match self.remote.list_dir(&parent).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %target, error = %e, "列出父目录失败");
                return Presence::Absent;
            }
        };

        match entries.iter().find(|e| e.name == name) {
            Some(entry) if entry.is_dir => Presence::Directory,
            Some(_) => Presence::File,
            None => Presence::Absent,
        }
    }

    /// 确保目录存在。同名文件冲突返回 [`SyncError::Conflict`]，其余失败返回 [`SyncError::Mkdir`]
    pub async fn ensure(&self, target: &str) -> Result<()> {
        let target = path::normalize(target);
        if path::is_root(&target) {
            return Ok(());
        }

        let plan = path::creation_plan(&target);

        // 自下而上找到第一个已存在的祖先
        let mut existing = 0;
        for (idx, candidate) in plan.iter().enumerate().rev() {
            match self.probe(candidate).await {
                Presence::Directory => {
                    existing = idx + 1;
                    break;
                }
                Presence::File => {
                    return Err(SyncError::Conflict {
                        path: candidate.clone(),
                    })
                }
                Presence::Absent => {}
            }
        }

        for candidate in &plan[existing..] {
            self.create_one(candidate).await?;
        }

        Ok(())
    }

    /// 先尝试一次性创建完整路径，失败后从根开始逐段创建，定位具体阻塞的目录段
    pub async fn force(&self, target: &str) -> Result<()> {
        let target = path::normalize(target);
        if path::is_root(&target) {
            return Ok(());
        }

        match self.probe(&target).await {
            Presence::Directory => return Ok(()),
            Presence::File => return Err(SyncError::Conflict { path: target }),
            Presence::Absent => {}
        }

        let outcome = self.remote.mkdir(&target).await;
        if outcome.success && self.probe(&target).await == Presence::Directory {
            info!(path = %target, "远端目录已创建");
            return Ok(());
        }
        warn!(path = %target, message = %outcome.message, "整体创建失败，改为逐段创建");

        for segment in path::creation_plan(&target) {
            match self.probe(&segment).await {
                Presence::Directory => continue,
                Presence::File => return Err(SyncError::Conflict { path: segment }),
                Presence::Absent => {}
            }

            if let Err(e) = self.create_one(&segment).await {
                return Err(match e {
                    SyncError::Mkdir { message, .. } => SyncError::BlockedSegment {
                        path: target.clone(),
                        segment,
                        message,
                    },
                    other => other,
                });
            }
        }

        Ok(())
    }

    async fn create_one(&self, target: &str) -> Result<()> {
        let outcome = self.remote.mkdir(target).await;
        if outcome.success {
            info!(path = target, "远端目录已创建");
            return Ok(());
        }

        // 可能已被其他客户端创建，或与同名文件冲突
        match self.probe(target).await {
            Presence::Directory => return Ok(()),
            Presence::File => {
                return Err(SyncError::Conflict {
                    path: target.to_string(),
                })
            }
            Presence::Absent => {}
        }

        if is_transient_mkdir_error(&outcome.message) {
            warn!(path = target, message = %outcome.message, "目录创建遇到并发写入，稍后重新确认");
            tokio::time::sleep(self.retry_delay).await;
            if self.probe(target).await == Presence::Directory {
                return Ok(());
            }
        }

        Err(SyncError::Mkdir {
            path: target.to_string(),
            message: outcome.message,
        })
    }
}
