use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use blog_store::config::Config;
use blog_store::definition::Definitions;
use blog_store::ready::ReadinessGate;
use blog_store::server::SetupServer;
use blog_store::setup::Orchestrator;
use blog_store::status::StatusInspector;
use blog_store::store::HttpStore;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blog-store", version, about = "Keeps the blog's search indices in sync with their definitions")]
struct Cli {
    /// TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖 elasticsearch.url
    #[arg(long)]
    es_url: Option<String>,

    /// 覆盖 setup.dir
    #[arg(long)]
    setup_dir: Option<PathBuf>,

    /// 覆盖 server.listen
    #[arg(long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 打印当前状态，未就绪时退出码为 1
    Status,
    /// 执行一次 setup，失败时退出码为 1
    Setup,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = cli.es_url {
        config.elasticsearch.url = url;
    }
    if let Some(dir) = cli.setup_dir {
        config.setup.dir = dir;
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    config.validate()?;

    let definitions = Arc::new(Definitions::load(&config.setup));
    let store = Arc::new(HttpStore::new(&config.elasticsearch)?);
    info!("Using Elasticsearch at {}", store.base_url());

    let inspector = Arc::new(StatusInspector::new(store, definitions.clone()));
    let gate = Arc::new(ReadinessGate::new(inspector.clone()));
    let orchestrator = Arc::new(Orchestrator::new(inspector, gate.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Status => {
            let status = gate.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(exit_code(status.is_ready()))
        }
        Command::Setup => {
            if let Some(e) = definitions.first_error() {
                tracing::error!("Definition error, setup cannot converge: {}", e);
            }
            let report = orchestrator.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_code(report.success()))
        }
        Command::Serve => {
            match gate.is_ready().await {
                Ok(true) => info!("Content store is ready"),
                Ok(false) => info!("Content store needs setup (POST /api/setup)"),
                Err(e) => tracing::warn!("Content store unreachable at startup: {}", e),
            }

            let server = SetupServer::new(gate, orchestrator);
            tokio::select! {
                res = server.run(&config.server.listen) => res?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
