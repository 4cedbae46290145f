//! 逻辑路径工具：远端路径统一使用 `/` 分隔，两个条目当且仅当逻辑路径字节相等时视为同一文件。

use std::path::{Path, PathBuf};

/// 规范化逻辑路径：反斜杠替换为 `/`，合并连续的 `/`，去掉末尾的 `/`（根目录 `/` 除外）
pub fn normalize(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let absolute = replaced.starts_with('/');
    let body = replaced
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    match (absolute, body.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", body),
        (false, _) => body,
    }
}

/// 拼接目录与条目名
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize(dir);
    let name = name.replace('\\', "/");
    let name = name.trim_matches('/');

    if dir.is_empty() {
        name.to_string()
    } else if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// 根目录（`/`）或空路径
pub fn is_root(path: &str) -> bool {
    let path = normalize(path);
    path.is_empty() || path == "/"
}

/// 父目录；根目录与空路径没有父目录
pub fn parent(path: &str) -> Option<String> {
    let path = normalize(path);
    if path.is_empty() || path == "/" {
        return None;
    }

    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => Some(String::new()),
    }
}

/// 最后一段名称
pub fn basename(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

/// 从根到目标的祖先链（包含目标本身，不包含根）
///
/// `/x/y/z` -> `["/x", "/x/y", "/x/y/z"]`
pub fn creation_plan(path: &str) -> Vec<String> {
    let path = normalize(path);
    let root = if path.starts_with('/') { "/" } else { "" };

    let mut plan = Vec::new();
    let mut current = root.to_string();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = join(&current, segment);
        plan.push(current.clone());
    }
    plan
}

/// `path` 相对于 `root` 的部分；`path` 不在 `root` 之下时返回 `None`
pub fn relative_to(root: &str, path: &str) -> Option<String> {
    let root = normalize(root);
    let path = normalize(path);

    if root == path {
        return Some(String::new());
    }
    if root.is_empty() {
        return Some(path);
    }

    let prefix = if root == "/" { root.clone() } else { format!("{}/", root) };
    path.strip_prefix(&prefix).map(str::to_string)
}

/// 能否作为单个路径段使用：非空、不是 `.`/`..`、不含分隔符
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// 将相对逻辑路径映射为本地目录
pub fn local_dir_for(local_root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(local_root.to_path_buf(), |acc, segment| acc.join(segment))
}
