use crate::sync::client::{RemoteEntry, RemoteFs};
use crate::sync::ledger::is_ledger_file;
use crate::sync::path;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// 一层目录的条目来源。列目录失败与目录为空一样返回空列表，失败原因写入日志。
#[async_trait]
pub trait EntrySource: Send + Sync {
    async fn list(&self, path: &str) -> Vec<RemoteEntry>;
}

/// 文件名过滤器：子串匹配，未设置或为空时匹配所有文件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter(Option<String>);

impl NameFilter {
    pub fn new(pattern: Option<&str>) -> Self {
        Self(pattern.filter(|p| !p.is_empty()).map(str::to_string))
    }

    pub fn all() -> Self {
        Self(None)
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.0 {
            Some(pattern) => name.contains(pattern.as_str()),
            None => true,
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// 拆分为（匹配的文件，全部子目录），保持列表原有顺序
    pub fn partition(&self, entries: Vec<RemoteEntry>) -> (Vec<RemoteEntry>, Vec<RemoteEntry>) {
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_dir);
        let files = files.into_iter().filter(|f| self.matches(&f.name)).collect();
        (files, dirs)
    }
}

/// 远端目录列表
pub struct RemoteLister<'a> {
    remote: &'a dyn RemoteFs,
}

impl<'a> RemoteLister<'a> {
    pub fn new(remote: &'a dyn RemoteFs) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl EntrySource for RemoteLister<'_> {
    async fn list(&self, path: &str) -> Vec<RemoteEntry> {
        match self.remote.list_dir(path).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| {
                    let plain = path::is_plain_name(&e.name);
                    if !plain {
                        warn!(path, name = %e.name, "远端条目名称不合法，已跳过");
                    }
                    plain
                })
                .collect(),
            Err(e) => {
                warn!(path, error = %e, "获取文件列表失败，按空目录处理");
                Vec::new()
            }
        }
    }
}

/// 本地目录列表，逻辑路径相对于 `root`（`""` 即 `root` 本身），按文件名排序，跳过记录文件
pub struct LocalLister {
    root: PathBuf,
}

impl LocalLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list_blocking(dir: &Path) -> Vec<RemoteEntry> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "读取本地目录失败");
                    continue;
                }
            };

            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => {
                    warn!(path = %entry.path().display(), "文件名不是有效的 UTF-8，已跳过");
                    continue;
                }
            };
            if is_ledger_file(&name) {
                continue;
            }

            if entry.file_type().is_dir() {
                entries.push(RemoteEntry::dir(name));
            } else if entry.file_type().is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                entries.push(RemoteEntry::file(name, size));
            }
        }

        entries
    }
}

#[async_trait]
impl EntrySource for LocalLister {
    async fn list(&self, path: &str) -> Vec<RemoteEntry> {
        let dir = path::local_dir_for(&self.root, path);
        match tokio::task::spawn_blocking(move || Self::list_blocking(&dir)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path, error = %e, "本地目录扫描任务失败");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_substring() {
        let filter = NameFilter::new(Some(".tif"));
        assert!(filter.matches("a.tif"));
        assert!(!filter.matches("a.jpg"));

        assert!(NameFilter::new(None).matches("anything"));
        assert!(NameFilter::new(Some("")).matches("anything"));
        assert_eq!(NameFilter::new(Some("")), NameFilter::all());
    }

    #[test]
    fn partition_never_filters_directories() {
        let filter = NameFilter::new(Some(".tif"));
        let (files, dirs) = filter.partition(vec![
            RemoteEntry::file("a.tif", 1),
            RemoteEntry::dir("photos"),
            RemoteEntry::file("a.jpg", 2),
            RemoteEntry::file("b.tif", 3),
        ]);
        assert_eq!(files, vec![RemoteEntry::file("a.tif", 1), RemoteEntry::file("b.tif", 3)]);
        assert_eq!(dirs, vec![RemoteEntry::dir("photos")]);
    }

    #[tokio::test]
    async fn local_lister_sorts_and_skips_ledger() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join(".upload_success.json"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), b"ccc").unwrap();

        let lister = LocalLister::new(dir.path());
        let root = lister.list("").await;
        assert_eq!(
            root,
            vec![
                RemoteEntry::file("a.txt", 1),
                RemoteEntry::file("b.txt", 2),
                RemoteEntry::dir("sub"),
            ]
        );

        let sub = lister.list("sub").await;
        assert_eq!(sub, vec![RemoteEntry::file("c.txt", 3)]);

        assert!(lister.list("missing").await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_lister_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ok.txt"), b"ok").unwrap();
        let raw = OsStr::from_bytes(b"bad\xff.txt");
        if std::fs::write(dir.path().join(raw), b"x").is_err() {
            // 文件系统不接受非 UTF-8 名称
            return;
        }

        let lister = LocalLister::new(dir.path());
        assert_eq!(lister.list("").await, vec![RemoteEntry::file("ok.txt", 2)]);
    }
}
