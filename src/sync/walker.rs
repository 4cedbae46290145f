//! 远端（或本地）目录树的深度优先遍历。
//!
//! 根目录深度为 0；`max_depth` 为 `Some(n)` 时只进入深度 `<= n` 的目录，
//! 超出深度的子目录仍计入所在层的目录数，但不会被列出。遍历为先序：
//! 先处理当前目录的文件，再按列表顺序进入子目录。

use crate::sync::client::RemoteEntry;
use crate::sync::lister::{EntrySource, NameFilter};
use crate::sync::path;
use async_trait::async_trait;

/// 目录树统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub files: u64,
    pub dirs: u64,
    pub size_bytes: u64,
}

impl TraversalStats {
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / (1024f64 * 1024f64 * 1024f64)
    }
}

/// 遍历参数
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub filter: NameFilter,
    pub max_depth: Option<usize>,
}

impl WalkOptions {
    pub fn new(filter: NameFilter, max_depth: Option<usize>) -> Self {
        Self { filter, max_depth }
    }

    fn may_descend(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

/// 遍历回调
#[async_trait]
pub trait TreeVisitor: Send {
    /// 每个目录调用一次，`files` 为过滤后的文件（可能为空）
    async fn visit_files(&mut self, dir: &str, depth: usize, files: Vec<RemoteEntry>);

    /// 进入子目录时调用（根目录不调用）
    fn enter_dir(&mut self, _dir: &str, _name: &str, _depth: usize) {}
}

pub struct TreeWalker<'a> {
    source: &'a dyn EntrySource,
}

impl<'a> TreeWalker<'a> {
    pub fn new(source: &'a dyn EntrySource) -> Self {
        Self { source }
    }

    /// 汇总 `root` 下的文件数、目录数和文件总大小
    pub async fn stats(&self, root: &str, options: &WalkOptions) -> TraversalStats {
        let mut stats = TraversalStats::default();
        let mut pending = vec![(path::normalize(root), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            let entries = self.source.list(&dir).await;
            let (files, dirs) = options.filter.partition(entries);

            stats.files += files.len() as u64;
            stats.size_bytes += files.iter().map(|f| f.size).sum::<u64>();
            stats.dirs += dirs.len() as u64;

            if options.may_descend(depth) {
                for sub in dirs.iter().rev() {
                    pending.push((path::join(&dir, &sub.name), depth + 1));
                }
            }
        }

        stats
    }

    /// 深度优先先序遍历，每个目录调用一次 `visit_files`
    pub async fn walk<V>(&self, root: &str, options: &WalkOptions, visitor: &mut V)
    where
        V: TreeVisitor + ?Sized,
    {
        // (目录, 名称, 深度)；根目录名称为空
        let mut pending = vec![(path::normalize(root), String::new(), 0usize)];

        while let Some((dir, name, depth)) = pending.pop() {
            if depth > 0 {
                visitor.enter_dir(&dir, &name, depth);
            }

            let entries = self.source.list(&dir).await;
            let (files, dirs) = options.filter.partition(entries);

            visitor.visit_files(&dir, depth, files).await;

            if options.may_descend(depth) {
                for sub in dirs.into_iter().rev() {
                    pending.push((path::join(&dir, &sub.name), sub.name, depth + 1));
                }
            }
        }
    }
}
