use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "alist-sync")]
#[command(about = "AList 批量同步工具 - 递归下载/上传远端目录，支持断点续传 / Batch sync against an AList server")]
#[command(version)]
#[command(after_help = r#"
EXAMPLES / 示例:
  Start or resume download / 开始或继续下载:
    alist-sync

  Upload local directory / 上传本地目录:
    alist-sync upload

  Show download progress / 查看下载状态:
    alist-sync status

  Clear download records / 清除下载记录:
    alist-sync clear

  Check a remote path / 检查远端路径:
    alist-sync check /data/photos

  Create a remote directory / 创建远端目录:
    alist-sync mkdir /backup/2024

  Write a config template / 生成配置模板:
    alist-sync init

DEFAULT CONFIG / 默认配置文件:
  ./alist_sync.json, then <config dir>/alist-sync/config.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// 配置文件路径 / Config file path
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// 服务器地址，覆盖配置文件 / Server address, overrides the config file
    #[arg(short = 's', long, global = true)]
    pub server: Option<String>,

    /// 认证令牌，覆盖配置文件 / Auth token, overrides the config file
    #[arg(short = 't', long, global = true)]
    pub token: Option<String>,

    /// 输出调试日志 / Verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 开始/继续下载（默认命令） / Start or resume download (default)
    Download,

    /// 上传本地目录到远端 / Upload the local directory
    Upload,

    /// 查看完成状态 / Show completion status
    Status {
        /// 查看上传状态 / Show upload status
        #[arg(short = 'u', long)]
        upload: bool,
    },

    /// 清除传输记录 / Clear transfer records
    Clear {
        /// 清除上传记录 / Clear upload records
        #[arg(short = 'u', long)]
        upload: bool,

        /// 跳过确认 / Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// 检查远端路径是否存在 / Check a remote path
    Check {
        /// 远端路径，默认为下载路径 / Remote path, defaults to the download path
        path: Option<String>,
    },

    /// 创建远端目录（含所有父目录） / Create a remote directory with parents
    Mkdir {
        /// 远端路径，默认为上传路径 / Remote path, defaults to the upload path
        path: Option<String>,
    },

    /// 生成配置文件模板 / Write a config template
    Init {
        /// 覆盖已有文件 / Overwrite an existing file
        #[arg(short = 'f', long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_download() {
        let cli = Cli::parse_from(["alist-sync"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_overrides_after_subcommand() {
        let cli = Cli::parse_from(["alist-sync", "status", "-u", "-s", "http://h:5244", "-c", "x.json"]);
        assert!(matches!(cli.command, Some(Command::Status { upload: true })));
        assert_eq!(cli.server.as_deref(), Some("http://h:5244"));
        assert_eq!(cli.config, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn check_accepts_optional_path() {
        let cli = Cli::parse_from(["alist-sync", "check", "/data"]);
        match cli.command {
            Some(Command::Check { path }) => assert_eq!(path.as_deref(), Some("/data")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
