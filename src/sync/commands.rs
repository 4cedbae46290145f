use crate::sync::client::AListClient;
use crate::sync::config::{Config, SyncSettings};
use crate::sync::engine::{Direction, RunOutcome, StatusReport, TransferEngine};
use crate::sync::ensurer::{DirectoryEnsurer, Presence};
use crate::sync::ledger::TransferLedger;
use crate::sync::lister::{EntrySource, RemoteLister};
use crate::sync::transfer::{self, Downloader, Uploader};
use crate::sync::walker::TraversalStats;
use anyhow::{bail, Context, Result};
use comfy_table::Table;
use dialoguer::Confirm;
use std::path::Path;

fn print_settings(direction: Direction, settings: &SyncSettings) {
    println!("🚀 启动批量{}...", direction.verb());
    println!("📁 远程路径: {}", settings.remote_path);
    println!("💾 本地目录: {}", settings.local_dir.display());
    println!("🔄 递归模式: {}", if settings.recursive { "开启" } else { "关闭" });
    if let Some(depth) = settings.max_depth {
        println!("📏 最大深度: {}", depth);
    }
    if let Some(pattern) = settings.file_pattern.as_deref().filter(|p| !p.is_empty()) {
        println!("🔍 文件过滤: {}", pattern);
    }
    println!();
}

/// 打印汇总；存在失败文件时返回错误
fn report_outcome(direction: Direction, outcome: &RunOutcome) -> Result<()> {
    let summary = match outcome {
        RunOutcome::NothingToDo => return Ok(()),
        RunOutcome::Completed(summary) => summary,
    };

    if summary.skipped > 0 {
        println!("⏭ 已{} {} 个文件，跳过", direction.verb(), summary.skipped);
    }
    if summary.attempted() == 0 {
        println!("🎉 所有文件已{}完成！", direction.verb());
        return Ok(());
    }

    println!(
        "\n🎯 {}完成: {}/{} 个文件成功",
        direction.verb(),
        summary.succeeded,
        summary.attempted()
    );
    println!(
        "📊 总体进度: {}/{} 个文件完成",
        summary.completed(),
        summary.matched
    );

    if !summary.failed.is_empty() {
        println!("❌ 失败文件:");
        for path in &summary.failed {
            println!("   {}", path);
        }
        println!("💡 重新运行将只传输未完成的文件");
        bail!("{} 个文件{}失败", summary.failed.len(), direction.verb());
    }

    Ok(())
}

/// 执行下载命令
pub async fn execute_download(config: &Config) -> Result<()> {
    let settings = config.download_settings()?;
    let client = AListClient::new(&config.client()?)?;
    let downloader = Downloader::new(&client, config.retries);
    let mut engine = TransferEngine::download(&client, &downloader);

    print_settings(Direction::Download, settings);

    let outcome = engine
        .run_single(&settings.remote_path, &settings.local_dir, &settings.options())
        .await
        .with_context(|| format!("下载失败: {}", settings.remote_path))?;

    report_outcome(Direction::Download, &outcome)
}

/// 执行上传命令
pub async fn execute_upload(config: &Config) -> Result<()> {
    let settings = config.upload_settings()?;
    let client = AListClient::new(&config.client()?)?;
    let uploader = Uploader::new(&client, config.retries);
    let mut engine = TransferEngine::upload(&client, &uploader);

    print_settings(Direction::Upload, settings);

    let outcome = engine
        .run_single(&settings.remote_path, &settings.local_dir, &settings.options())
        .await
        .with_context(|| format!("上传失败: {}", settings.local_dir.display()))?;

    report_outcome(Direction::Upload, &outcome)
}

fn status_table(direction: Direction, report: &StatusReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["项目", "数值"]);
    table.add_row(vec!["总文件数".to_string(), report.total.to_string()]);
    if report.recursive {
        table.add_row(vec!["总目录数".to_string(), report.stats.dirs.to_string()]);
    }
    table.add_row(vec![format!("已{}", direction.verb()), report.done.to_string()]);
    table.add_row(vec![format!("未{}", direction.verb()), report.remaining().to_string()]);
    table.add_row(vec!["完成度".to_string(), format!("{:.1}%", report.percent())]);
    table.add_row(vec!["总大小".to_string(), format!("{:.2} GB", report.stats.size_gb())]);
    table
}

/// 执行状态查询
pub async fn execute_status(config: &Config, upload: bool) -> Result<()> {
    let (direction, settings) = if upload {
        (Direction::Upload, config.upload_settings()?)
    } else {
        (Direction::Download, config.download_settings()?)
    };
    let client = AListClient::new(&config.client()?)?;
    let file_transfer = transfer::for_direction(direction, &client, config.retries);
    let mut engine = TransferEngine::new(direction, &client, file_transfer.as_ref());

    println!("📊 检查{}状态...", direction.verb());
    let report = engine
        .status(&settings.remote_path, &settings.local_dir, &settings.options())
        .await?;

    if report.total == 0 {
        println!("❌ 未找到符合条件的文件");
        return Ok(());
    }

    let scope = if report.recursive { "递归" } else { "当前目录" };
    println!("📊 {}状态 ({}):", direction.verb(), scope);
    println!("{}", status_table(direction, &report));
    Ok(())
}

/// 执行清除记录命令
pub fn execute_clear(config: &Config, upload: bool, yes: bool) -> Result<()> {
    let (direction, settings) = if upload {
        (Direction::Upload, config.upload_settings()?)
    } else {
        (Direction::Download, config.download_settings()?)
    };

    println!("🗑 清除{}记录...", direction.verb());
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("确认清除所有{}记录？", direction.verb()))
            .default(false)
            .interact()
            .context("读取确认输入失败")?;
    if !confirmed {
        println!("已取消");
        return Ok(());
    }

    let mut ledger = TransferLedger::new();
    ledger.bind_file(&settings.local_dir, direction.ledger_file());
    ledger
        .clear()
        .with_context(|| format!("清除{}记录失败: {}", direction.verb(), settings.local_dir.display()))?;
    println!("✅ {}记录已清除", direction.verb());
    Ok(())
}

/// 执行远端路径检查
pub async fn execute_check(config: &Config, path: Option<String>) -> Result<()> {
    let target = match path {
        Some(p) => p,
        None => config.download_settings()?.remote_path.clone(),
    };
    let client = AListClient::new(&config.client()?)?;
    let ensurer = DirectoryEnsurer::new(&client);

    println!("🔍 检查远端路径: {}", target);
    match ensurer.probe(&target).await {
        Presence::Directory => {
            let entries = RemoteLister::new(&client).list(&target).await;
            let stats = entries.iter().fold(TraversalStats::default(), |mut acc, e| {
                if e.is_dir {
                    acc.dirs += 1;
                } else {
                    acc.files += 1;
                    acc.size_bytes += e.size;
                }
                acc
            });
            println!("📂 目录存在: {}", target);
            println!("   文件: {} 个", stats.files);
            println!("   子目录: {} 个", stats.dirs);
            println!("   当前层大小: {:.2} GB", stats.size_gb());
        }
        Presence::File => println!("📄 路径是文件: {}", target),
        Presence::Absent => println!("❌ 路径不存在或无法访问: {}", target),
    }
    Ok(())
}

/// 执行创建远端目录命令
pub async fn execute_mkdir(config: &Config, path: Option<String>) -> Result<()> {
    let target = match path {
        Some(p) => p,
        None => config
            .upload
            .as_ref()
            .map(|u| u.remote_path.clone())
            .filter(|p| !p.trim().is_empty())
            .context("未指定路径，且配置中没有 upload.remote_path")?,
    };
    let client = AListClient::new(&config.client()?)?;
    let ensurer = DirectoryEnsurer::new(&client);

    println!("📁 创建远端目录: {}", target);
    ensurer.force(&target).await?;
    println!("✅ 远端目录可用: {}", target);
    Ok(())
}

/// 生成配置模板
pub fn execute_init(path: &Path, force: bool) -> Result<()> {
    Config::write_template(path, force)?;
    println!("✅ 已生成配置模板: {}", path.display());
    println!("💡 请填写 server_url、token 以及 download/upload 配置后再运行");
    Ok(())
}
