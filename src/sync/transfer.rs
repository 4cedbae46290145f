use crate::sync::client::AListClient;
use crate::sync::engine::{Direction, FileTransfer};
use crate::sync::path;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_RETRIES: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

fn bytes_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.green/white}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message);
    pb
}

/// 按传输方向选择单文件传输实现
pub fn for_direction<'a>(
    direction: Direction,
    client: &'a AListClient,
    retries: u32,
) -> Box<dyn FileTransfer + 'a> {
    match direction {
        Direction::Download => Box::new(Downloader::new(client, retries)),
        Direction::Upload => Box::new(Uploader::new(client, retries)),
    }
}

/// 部分下载文件：`<文件名>.part`
fn part_path(local_dir: &Path, filename: &str) -> PathBuf {
    local_dir.join(format!("{}.part", filename))
}

/// 通过 HTTP 直链下载，失败自动重试并续传，成功后才重命名为目标文件
pub struct Downloader<'a> {
    client: &'a AListClient,
    retries: u32,
    backoff: Duration,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a AListClient, retries: u32) -> Self {
        Self {
            client,
            retries: retries.max(1),
            backoff: RETRY_BACKOFF,
        }
    }

    /// 第 n 次失败后等待 `backoff * n` 再重试
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl FileTransfer for Downloader<'_> {
    async fn transfer_one(&self, directory: &str, filename: &str, local_dir: &Path) -> bool {
        let remote_path = path::join(directory, filename);
        let target = local_dir.join(filename);
        let part = part_path(local_dir, filename);

        if target.exists() {
            println!("📁 本地文件已存在，重新下载覆盖: {}", filename);
        }

        for attempt in 1..=self.retries {
            let pb = bytes_bar();
            match self.client.download_to(&remote_path, &part, &pb).await {
                Ok(()) => {
                    pb.finish_and_clear();
                    match tokio::fs::rename(&part, &target).await {
                        Ok(()) => return true,
                        Err(e) => {
                            warn!(path = %remote_path, error = %e, "重命名下载文件失败");
                            break;
                        }
                    }
                }
                Err(e) => {
                    pb.abandon();
                    warn!(path = %remote_path, attempt, retries = self.retries, error = %e, "下载失败");
                    if attempt < self.retries {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        // 不留下不完整的文件
        if let Err(e) = tokio::fs::remove_file(&part).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %part.display(), error = %e, "删除不完整文件失败");
            }
        }
        false
    }
}

/// 通过 `PUT /api/fs/put` 上传单个文件
pub struct Uploader<'a> {
    client: &'a AListClient,
    retries: u32,
    backoff: Duration,
}

impl<'a> Uploader<'a> {
    pub fn new(client: &'a AListClient, retries: u32) -> Self {
        Self {
            client,
            retries: retries.max(1),
            backoff: RETRY_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl FileTransfer for Uploader<'_> {
    async fn transfer_one(&self, directory: &str, filename: &str, local_dir: &Path) -> bool {
        let remote_path = path::join(directory, filename);
        let local = local_dir.join(filename);

        for attempt in 1..=self.retries {
            let pb = spinner(format!("正在上传 {}", filename));
            match self.client.put_file(&local, &remote_path).await {
                Ok(()) => {
                    pb.finish_and_clear();
                    return true;
                }
                Err(e) => {
                    pb.abandon();
                    warn!(path = %remote_path, attempt, retries = self.retries, error = %e, "上传失败");
                    if attempt < self.retries {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }
        false
    }
}
