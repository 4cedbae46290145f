#![allow(dead_code)]

use alist_sync::sync::client::{MkdirOutcome, RemoteEntry, RemoteFs};
use alist_sync::sync::engine::FileTransfer;
use alist_sync::sync::path;
use alist_sync::sync::{Result, SyncError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub fn setup_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// 内存中的远端文件系统
#[derive(Default)]
pub struct MockRemote {
    tree: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    failing_lists: Mutex<HashSet<String>>,
    /// 路径 -> (错误信息, 剩余失败次数)
    mkdir_failures: Mutex<HashMap<String, (String, usize)>>,
    /// 创建失败后由“其他客户端”补建的目录
    created_by_others: Mutex<HashSet<String>>,
    pub list_calls: Mutex<Vec<String>>,
    pub mkdir_calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        remote.tree.lock().unwrap().insert("/".to_string(), Vec::new());
        remote
    }

    pub fn add_dir(&self, dir: &str) {
        let dir = path::normalize(dir);
        let mut tree = self.tree.lock().unwrap();
        tree.entry(dir.clone()).or_default();
        if let Some(parent) = path::parent(&dir) {
            let name = path::basename(&dir);
            let siblings = tree.entry(parent).or_default();
            if !siblings.iter().any(|e| e.name == name) {
                siblings.push(RemoteEntry::dir(name));
            }
        }
    }

    pub fn add_file(&self, file: &str, size: u64) {
        let file = path::normalize(file);
        let parent = path::parent(&file).unwrap_or_default();
        self.tree
            .lock()
            .unwrap()
            .entry(parent)
            .or_default()
            .push(RemoteEntry::file(path::basename(&file), size));
    }

    /// 原样放入一个条目，不做任何路径规范化
    pub fn add_raw_entry(&self, dir: &str, entry: RemoteEntry) {
        self.tree
            .lock()
            .unwrap()
            .entry(dir.to_string())
            .or_default()
            .push(entry);
    }

    pub fn fail_list(&self, dir: &str) {
        self.failing_lists.lock().unwrap().insert(dir.to_string());
    }

    pub fn fail_mkdir(&self, dir: &str, message: &str, times: usize) {
        self.mkdir_failures
            .lock()
            .unwrap()
            .insert(dir.to_string(), (message.to_string(), times));
    }

    /// mkdir 失败后目录仍被并发创建出来
    pub fn created_concurrently(&self, dir: &str) {
        self.created_by_others.lock().unwrap().insert(dir.to_string());
    }

    pub fn has_dir(&self, dir: &str) -> bool {
        self.tree.lock().unwrap().contains_key(dir)
    }

    pub fn mkdirs(&self) -> Vec<String> {
        self.mkdir_calls.lock().unwrap().clone()
    }

    pub fn lists(&self) -> Vec<String> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFs for MockRemote {
    async fn list_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        self.list_calls.lock().unwrap().push(dir.to_string());
        if self.failing_lists.lock().unwrap().contains(dir) {
            return Err(SyncError::Api {
                path: dir.to_string(),
                code: 500,
                message: "failed to list".to_string(),
            });
        }
        self.tree
            .lock()
            .unwrap()
            .get(&path::normalize(dir))
            .cloned()
            .ok_or_else(|| SyncError::Api {
                path: dir.to_string(),
                code: 500,
                message: "object not found".to_string(),
            })
    }

    async fn mkdir(&self, dir: &str) -> MkdirOutcome {
        self.mkdir_calls.lock().unwrap().push(dir.to_string());

        let failure = {
            let mut failures = self.mkdir_failures.lock().unwrap();
            match failures.get_mut(dir) {
                Some((message, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(message.clone())
                }
                _ => None,
            }
        };

        if let Some(message) = failure {
            if self.created_by_others.lock().unwrap().contains(dir) {
                self.add_dir(dir);
            }
            return MkdirOutcome::failed(message);
        }

        self.add_dir(dir);
        MkdirOutcome::ok()
    }
}

/// 记录调用的传输原语；下载方向时在本地目录写入文件
#[derive(Default)]
pub struct RecordingTransfer {
    pub calls: Mutex<Vec<(String, String, PathBuf)>>,
    failing: Mutex<HashSet<String>>,
    write_files: bool,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writing_files() -> Self {
        Self {
            write_files: true,
            ..Self::default()
        }
    }

    pub fn fail_on(&self, filename: &str) {
        self.failing.lock().unwrap().insert(filename.to_string());
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn remote_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(dir, name, _)| path::join(dir, name))
            .collect()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl FileTransfer for RecordingTransfer {
    async fn transfer_one(&self, directory: &str, filename: &str, local_dir: &Path) -> bool {
        self.calls.lock().unwrap().push((
            directory.to_string(),
            filename.to_string(),
            local_dir.to_path_buf(),
        ));

        if self.failing.lock().unwrap().contains(filename) {
            return false;
        }
        if self.write_files {
            std::fs::write(local_dir.join(filename), b"data").expect("write local file");
        }
        true
    }
}

/// root/{f1.txt(10B), sub/{f2.txt(20B)}}
pub fn sample_tree() -> MockRemote {
    let remote = MockRemote::new();
    remote.add_dir("/root");
    remote.add_file("/root/f1.txt", 10);
    remote.add_dir("/root/sub");
    remote.add_file("/root/sub/f2.txt", 20);
    remote
}
