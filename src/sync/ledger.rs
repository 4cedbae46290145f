//! 传输完成记录。
//!
//! 记录文件为 `<本地根目录>/.download_success.json`（上传方向为
//! `.upload_success.json`），内容为 `{"downloaded_files": [...], "last_update": ...}`。
//! 每次新增都整体重写：先写临时文件再重命名，已有的有效记录不会因写入中断而丢失。
//! 持久化失败只记录日志，内存中的集合仍是本次运行的依据。

use crate::sync::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DOWNLOAD_LEDGER_FILE: &str = ".download_success.json";
pub const UPLOAD_LEDGER_FILE: &str = ".upload_success.json";

/// 记录文件及其临时文件不参与上传
pub fn is_ledger_file(name: &str) -> bool {
    [DOWNLOAD_LEDGER_FILE, UPLOAD_LEDGER_FILE]
        .iter()
        .any(|ledger| name == *ledger || name.starts_with(&format!("{}.", ledger)))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    downloaded_files: Vec<String>,
    #[serde(default)]
    last_update: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct TransferLedger {
    file: Option<PathBuf>,
    completed: BTreeSet<String>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定下载记录文件并加载
    pub fn bind(&mut self, root_dir: &Path) {
        self.bind_file(root_dir, DOWNLOAD_LEDGER_FILE);
    }

    /// 绑定 `<root_dir>/<file_name>` 并加载；JSON 损坏时按空记录处理
    pub fn bind_file(&mut self, root_dir: &Path, file_name: &str) {
        let file = root_dir.join(file_name);
        self.completed = load(&file);
        if !self.completed.is_empty() {
            println!("📒 加载已传输文件记录: {} 个文件", self.completed.len());
        }
        self.file = Some(file);
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.completed.contains(path)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// 加入完成集合并立即整体持久化
    pub fn mark_done(&mut self, path: &str) {
        self.completed.insert(path.to_string());

        if let Some(file) = &self.file {
            if let Err(e) = persist(file, &self.completed) {
                warn!(path, ledger = %file.display(), error = %e, "保存传输记录失败");
                println!("⚠️  保存传输记录失败: {} - {}", path, e);
            }
        }
    }

    /// 清空记录并删除记录文件，可重复调用
    pub fn clear(&mut self) -> Result<()> {
        self.completed.clear();
        if let Some(file) = &self.file {
            match fs::remove_file(file) {
                Ok(()) => debug!(ledger = %file.display(), "记录文件已删除"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn load(file: &Path) -> BTreeSet<String> {
    let content = match fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!(ledger = %file.display(), error = %e, "读取传输记录失败");
            println!("⚠️  读取传输记录失败: {}", e);
            return BTreeSet::new();
        }
    };

    match serde_json::from_str::<LedgerDocument>(&content) {
        Ok(doc) => doc.downloaded_files.into_iter().collect(),
        Err(e) => {
            warn!(ledger = %file.display(), error = %e, "传输记录格式错误，按空记录处理");
            println!("⚠️  传输记录格式错误，已重置: {}", e);
            BTreeSet::new()
        }
    }
}

fn persist(file: &Path, completed: &BTreeSet<String>) -> Result<()> {
    let doc = LedgerDocument {
        downloaded_files: completed.iter().cloned().collect(),
        last_update: Some(serde_json::Value::String(chrono::Local::now().to_rfc3339())),
    };
    let json = serde_json::to_string_pretty(&doc)?;

    let mut tmp = file.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)?;
    fs::rename(&tmp, file)?;
    Ok(())
}
