use crate::sync::client::{RemoteEntry, RemoteFs};
use crate::sync::ensurer::DirectoryEnsurer;
use crate::sync::error::SyncError;
use crate::sync::ledger::{TransferLedger, DOWNLOAD_LEDGER_FILE, UPLOAD_LEDGER_FILE};
use crate::sync::lister::{EntrySource, LocalLister, NameFilter, RemoteLister};
use crate::sync::path;
use crate::sync::walker::{TraversalStats, TreeVisitor, TreeWalker, WalkOptions};
use crate::sync::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 单文件传输原语。`directory` 始终是远端目录，`local_dir` 始终是本地目录；
/// 失败时不得留下不完整的目标文件。
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn transfer_one(&self, directory: &str, filename: &str, local_dir: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn ledger_file(self) -> &'static str {
        match self {
            Direction::Download => DOWNLOAD_LEDGER_FILE,
            Direction::Upload => UPLOAD_LEDGER_FILE,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Direction::Download => "下载",
            Direction::Upload => "上传",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Direction::Download => "📥",
            Direction::Upload => "📤",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub filter: NameFilter,
    pub recursive: bool,
    pub max_depth: Option<usize>,
}

impl TransferOptions {
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions::new(self.filter.clone(), self.max_depth)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// 符合条件的文件数
    pub matched: u64,
    /// 记录中已完成而跳过的文件数
    pub skipped: u64,
    pub succeeded: u64,
    /// 失败文件的逻辑路径
    pub failed: Vec<String>,
}

impl TransferSummary {
    pub fn attempted(&self) -> u64 {
        self.succeeded + self.failed.len() as u64
    }

    pub fn completed(&self) -> u64 {
        self.skipped + self.succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 没有符合条件的文件
    NothingToDo,
    Completed(TransferSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub done: u64,
    pub total: u64,
    pub stats: TraversalStats,
    pub recursive: bool,
}

impl StatusReport {
    pub fn remaining(&self) -> u64 {
        self.total - self.done
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// 遍历到的目录在远端与本地的对应位置
struct Layout {
    direction: Direction,
    remote_root: String,
    local_root: PathBuf,
}

impl Layout {
    fn new(direction: Direction, remote_root: &str, local_root: &Path) -> Self {
        Self {
            direction,
            remote_root: path::normalize(remote_root),
            local_root: local_root.to_path_buf(),
        }
    }

    /// 遍历的起点：下载遍历远端，上传遍历本地（相对路径 `""`）
    fn source_root(&self) -> &str {
        match self.direction {
            Direction::Download => &self.remote_root,
            Direction::Upload => "",
        }
    }

    fn source_root_display(&self) -> String {
        match self.direction {
            Direction::Download => self.remote_root.clone(),
            Direction::Upload => self.local_root.display().to_string(),
        }
    }

    fn relative(&self, dir: &str) -> String {
        match self.direction {
            Direction::Download => path::relative_to(&self.remote_root, dir).unwrap_or_default(),
            Direction::Upload => path::normalize(dir),
        }
    }

    fn remote_dir(&self, dir: &str) -> String {
        let relative = self.relative(dir);
        if relative.is_empty() {
            self.remote_root.clone()
        } else {
            path::join(&self.remote_root, &relative)
        }
    }

    fn local_dir(&self, dir: &str) -> PathBuf {
        path::local_dir_for(&self.local_root, &self.relative(dir))
    }
}

struct TransferVisitor<'e> {
    layout: &'e Layout,
    transfer: &'e dyn FileTransfer,
    ensurer: DirectoryEnsurer<'e>,
    ledger: &'e mut TransferLedger,
    summary: TransferSummary,
}

impl TransferVisitor<'_> {
    /// 为当前目录准备目标位置：下载时创建本地目录，上传时确保远端目录存在
    async fn prepare(&self, remote_dir: &str, local_dir: &Path) -> Result<()> {
        match self.layout.direction {
            Direction::Download => {
                tokio::fs::create_dir_all(local_dir).await?;
                Ok(())
            }
            Direction::Upload => self.ensurer.ensure(remote_dir).await,
        }
    }
}

#[async_trait]
impl TreeVisitor for TransferVisitor<'_> {
    async fn visit_files(&mut self, dir: &str, depth: usize, files: Vec<RemoteEntry>) {
        if files.is_empty() {
            return;
        }

        let indent = "  ".repeat(depth);
        let direction = self.layout.direction;
        let remote_dir = self.layout.remote_dir(dir);
        let local_dir = self.layout.local_dir(dir);

        let mut pending = Vec::new();
        for file in &files {
            let key = path::join(&remote_dir, &file.name);
            self.summary.matched += 1;
            if self.ledger.contains(&key) {
                println!("{}⏭ 跳过已{}: {}", indent, direction.verb(), key);
                self.summary.skipped += 1;
            } else {
                pending.push((file, key));
            }
        }

        if pending.is_empty() {
            return;
        }

        println!("{}📁 当前目录有 {} 个文件待{}", indent, pending.len(), direction.verb());

        if let Err(e) = self.prepare(&remote_dir, &local_dir).await {
            warn!(dir = %remote_dir, error = %e, "准备目标目录失败");
            println!("{}❌ 目录不可用，跳过 {} 个文件: {}", indent, pending.len(), e);
            self.summary
                .failed
                .extend(pending.into_iter().map(|(_, key)| key));
            return;
        }

        let total = pending.len();
        let mut success_count = 0;
        for (i, (file, key)) in pending.into_iter().enumerate() {
            println!(
                "{}[{}/{}] {} {}: {}",
                indent,
                i + 1,
                total,
                direction.icon(),
                direction.verb(),
                key
            );

            if self.transfer.transfer_one(&remote_dir, &file.name, &local_dir).await {
                println!("{}✅ 成功: {}", indent, key);
                self.ledger.mark_done(&key);
                self.summary.succeeded += 1;
                success_count += 1;
            } else {
                println!("{}❌ 失败: {}", indent, key);
                self.summary.failed.push(key);
            }
        }

        println!("{}📈 当前目录完成: {}/{} 个文件", indent, success_count, total);
    }

    fn enter_dir(&mut self, _dir: &str, name: &str, depth: usize) {
        println!("{}📂 进入子目录: {}", "  ".repeat(depth - 1), name);
    }
}

struct StatusVisitor<'e> {
    layout: &'e Layout,
    ledger: &'e TransferLedger,
    done: u64,
    total: u64,
}

#[async_trait]
impl TreeVisitor for StatusVisitor<'_> {
    async fn visit_files(&mut self, dir: &str, _depth: usize, files: Vec<RemoteEntry>) {
        let remote_dir = self.layout.remote_dir(dir);
        for file in &files {
            self.total += 1;
            if self.ledger.contains(&path::join(&remote_dir, &file.name)) {
                self.done += 1;
            }
        }
    }
}

/// 批量同步引擎，绑定一个本地根目录及其传输记录
pub struct TransferEngine<'a> {
    direction: Direction,
    remote: &'a dyn RemoteFs,
    transfer: &'a dyn FileTransfer,
    ledger: TransferLedger,
    mkdir_retry_delay: Option<Duration>,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        direction: Direction,
        remote: &'a dyn RemoteFs,
        transfer: &'a dyn FileTransfer,
    ) -> Self {
        Self {
            direction,
            remote,
            transfer,
            ledger: TransferLedger::new(),
            mkdir_retry_delay: None,
        }
    }

    pub fn download(remote: &'a dyn RemoteFs, transfer: &'a dyn FileTransfer) -> Self {
        Self::new(Direction::Download, remote, transfer)
    }

    pub fn upload(remote: &'a dyn RemoteFs, transfer: &'a dyn FileTransfer) -> Self {
        Self::new(Direction::Upload, remote, transfer)
    }

    pub fn with_mkdir_retry_delay(mut self, delay: Duration) -> Self {
        self.mkdir_retry_delay = Some(delay);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ledger(&self) -> &TransferLedger {
        &self.ledger
    }

    pub fn bind_ledger(&mut self, local_root: &Path) {
        self.ledger.bind_file(local_root, self.direction.ledger_file());
    }

    /// 清空 `local_root` 下的传输记录
    pub fn clear_ledger(&mut self, local_root: &Path) -> Result<()> {
        self.bind_ledger(local_root);
        self.ledger.clear()
    }

    fn ensurer(&self) -> DirectoryEnsurer<'a> {
        let ensurer = DirectoryEnsurer::new(self.remote);
        match self.mkdir_retry_delay {
            Some(delay) => ensurer.with_retry_delay(delay),
            None => ensurer,
        }
    }

    async fn check_local_source(&self, local_root: &Path) -> Result<()> {
        if self.direction == Direction::Download {
            return Ok(());
        }
        match tokio::fs::metadata(local_root).await {
            Ok(m) if m.is_dir() => Ok(()),
            _ => Err(SyncError::LocalSourceMissing(local_root.to_path_buf())),
        }
    }

    /// 同步整个目录：递归模式先统计，再深度优先逐目录传输
    pub async fn run_directory(
        &mut self,
        remote_root: &str,
        local_root: &Path,
        options: &TransferOptions,
    ) -> Result<RunOutcome> {
        self.check_local_source(local_root).await?;

        let layout = Layout::new(self.direction, remote_root, local_root);
        let remote_lister = RemoteLister::new(self.remote);
        let local_lister = LocalLister::new(local_root);
        let source: &dyn EntrySource = match self.direction {
            Direction::Download => &remote_lister,
            Direction::Upload => &local_lister,
        };
        let walker = TreeWalker::new(source);
        let walk_options = options.walk_options();

        println!("🔍 分析目录: {}", layout.source_root_display());

        let root_files = if options.recursive {
            println!("📊 统计目录结构...");
            let stats = walker.stats(layout.source_root(), &walk_options).await;
            if stats.files == 0 {
                println!("❌ 未找到符合条件的文件");
                return Ok(RunOutcome::NothingToDo);
            }

            println!("📋 目录统计:");
            println!("   文件总数: {} 个", stats.files);
            println!("   目录总数: {} 个", stats.dirs);
            println!("   总大小: {:.2} GB", stats.size_gb());
            None
        } else {
            let entries = source.list(layout.source_root()).await;
            let (files, _) = options.filter.partition(entries);
            if files.is_empty() {
                println!("❌ 没有符合条件的文件");
                return Ok(RunOutcome::NothingToDo);
            }

            let total_size: u64 = files.iter().map(|f| f.size).sum();
            println!("📋 找到 {} 个文件", files.len());
            println!("📊 总大小: {:.2} GB", total_size as f64 / (1024f64 * 1024f64 * 1024f64));
            Some(files)
        };

        tokio::fs::create_dir_all(local_root).await?;
        self.bind_ledger(local_root);

        let ensurer = self.ensurer();
        let mut visitor = TransferVisitor {
            layout: &layout,
            transfer: self.transfer,
            ensurer,
            ledger: &mut self.ledger,
            summary: TransferSummary::default(),
        };

        match root_files {
            Some(files) => visitor.visit_files(layout.source_root(), 0, files).await,
            None => {
                println!("🚀 开始递归{}...", self.direction.verb());
                walker.walk(layout.source_root(), &walk_options, &mut visitor).await;
            }
        }

        let summary = visitor.summary;
        info!(
            matched = summary.matched,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            "目录同步结束"
        );
        Ok(RunOutcome::Completed(summary))
    }

    /// 单一入口：路径指向文件时只传输该文件，否则按目录处理
    ///
    /// 下载时检查远端路径（列出父目录并匹配非目录条目），上传时检查本地路径。
    pub async fn run_single(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        options: &TransferOptions,
    ) -> Result<RunOutcome> {
        match self.direction {
            Direction::Download => {
                let remote_path = path::normalize(remote_path);
                if let Some(parent) = path::parent(&remote_path) {
                    let name = path::basename(&remote_path);
                    let entries = RemoteLister::new(self.remote).list(&parent).await;
                    if let Some(entry) = entries.into_iter().find(|e| !e.is_dir && e.name == name) {
                        println!("📄 远端路径是文件: {}", remote_path);
                        return self.transfer_single(&parent, local_path, entry).await;
                    }
                }
                self.run_directory(&remote_path, local_path, options).await
            }
            Direction::Upload => {
                let metadata = tokio::fs::metadata(local_path)
                    .await
                    .map_err(|_| SyncError::LocalSourceMissing(local_path.to_path_buf()))?;
                if metadata.is_file() {
                    let name = local_path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            SyncError::Config(format!(
                                "本地文件名不是有效的 UTF-8: {}",
                                local_path.display()
                            ))
                        })?;
                    let local_dir = local_path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    println!("📄 本地路径是文件: {}", local_path.display());
                    let entry = RemoteEntry::file(name, metadata.len());
                    return self.transfer_single(remote_path, &local_dir, entry).await;
                }
                self.run_directory(remote_path, local_path, options).await
            }
        }
    }

    async fn transfer_single(
        &mut self,
        remote_root: &str,
        local_root: &Path,
        entry: RemoteEntry,
    ) -> Result<RunOutcome> {
        let layout = Layout::new(self.direction, remote_root, local_root);
        let dir = layout.source_root().to_string();

        tokio::fs::create_dir_all(local_root).await?;
        self.bind_ledger(local_root);

        let ensurer = self.ensurer();
        let mut visitor = TransferVisitor {
            layout: &layout,
            transfer: self.transfer,
            ensurer,
            ledger: &mut self.ledger,
            summary: TransferSummary::default(),
        };
        visitor.visit_files(&dir, 0, vec![entry]).await;

        Ok(RunOutcome::Completed(visitor.summary))
    }

    /// 统计完成度，遍历规则与 [`run_directory`](Self::run_directory) 完全一致，不做任何传输
    pub async fn status(
        &mut self,
        remote_root: &str,
        local_root: &Path,
        options: &TransferOptions,
    ) -> Result<StatusReport> {
        self.check_local_source(local_root).await?;

        let layout = Layout::new(self.direction, remote_root, local_root);
        let remote_lister = RemoteLister::new(self.remote);
        let local_lister = LocalLister::new(local_root);
        let source: &dyn EntrySource = match self.direction {
            Direction::Download => &remote_lister,
            Direction::Upload => &local_lister,
        };

        self.bind_ledger(local_root);

        let mut visitor = StatusVisitor {
            layout: &layout,
            ledger: &self.ledger,
            done: 0,
            total: 0,
        };

        let stats = if options.recursive {
            let walker = TreeWalker::new(source);
            let walk_options = options.walk_options();
            let stats = walker.stats(layout.source_root(), &walk_options).await;
            if stats.files > 0 {
                walker.walk(layout.source_root(), &walk_options, &mut visitor).await;
            }
            stats
        } else {
            let entries = source.list(layout.source_root()).await;
            let (files, dirs) = options.filter.partition(entries);
            let stats = TraversalStats {
                files: files.len() as u64,
                dirs: dirs.len() as u64,
                size_bytes: files.iter().map(|f| f.size).sum(),
            };
            visitor.visit_files(layout.source_root(), 0, files).await;
            stats
        };

        Ok(StatusReport {
            done: visitor.done,
            total: visitor.total,
            stats,
            recursive: options.recursive,
        })
    }
}
