use alist_sync::sync::cli::{Cli, Command};
use alist_sync::sync::commands::{
    execute_check, execute_clear, execute_download, execute_init, execute_mkdir, execute_status,
    execute_upload,
};
use alist_sync::sync::config::{default_config_path, Config};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tokio::select! {
        result = run_sync_client(cli) => {
            if let Err(e) = result {
                eprintln!("❌ 错误: {:#}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n⏹ 传输被用户中断");
            println!("💡 下次运行时将从中断处继续");
            std::process::exit(130);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("alist_sync={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_sync_client(cli: Cli) -> Result<(), anyhow::Error> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let load = || -> Result<Config, anyhow::Error> {
        let mut config = Config::load(&config_path)?;
        config.apply_overrides(cli.server.clone(), cli.token.clone());
        Ok(config)
    };

    match cli.command.clone().unwrap_or(Command::Download) {
        Command::Download => execute_download(&load()?).await?,
        Command::Upload => execute_upload(&load()?).await?,
        Command::Status { upload } => execute_status(&load()?, upload).await?,
        Command::Clear { upload, yes } => execute_clear(&load()?, upload, yes)?,
        Command::Check { path } => execute_check(&load()?, path).await?,
        Command::Mkdir { path } => execute_mkdir(&load()?, path).await?,
        Command::Init { force } => execute_init(&config_path, force)?,
    }
    Ok(())
}
