//! AList 批量同步：递归遍历远端目录树，按完成记录断点续传下载，并支持按需创建远端目录的上传。

pub mod sync;
