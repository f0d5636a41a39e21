use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stream_chat::{
    config, run_server,
    upstream::{MemoryUpstream, SeedData, Upstream},
    ServerArgs,
};

#[derive(Parser, Debug)]
#[command(name = "chatserver", about = "Live stream chat fan-out server")]
struct Cli {
    /// WebSocket / HTTP 포트
    #[arg(long, default_value_t = config::CHAT_PORT)]
    port: u16,

    /// 테넌트 스키마
    #[arg(long, default_value = config::DEFAULT_TENANT)]
    tenant: String,

    /// 인메모리 협력자 시드 JSON (세션, 스트림, 금칙어, 타임아웃)
    #[arg(long)]
    seed: Option<PathBuf>,

    /// 영속화 워커 수
    #[arg(long, default_value_t = config::PERSIST_WORKERS)]
    persist_workers: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG 우선, 없으면 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let memory = match &cli.seed {
        Some(path) => match SeedData::from_file(path) {
            Ok(seed) => {
                info!("[seed] loaded {}", path.display());
                MemoryUpstream::from_seed(seed)
            }
            Err(e) => {
                error!("[seed] failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => MemoryUpstream::new(),
    };

    let args = ServerArgs {
        port:            cli.port,
        tenant:          cli.tenant,
        persist_workers: cli.persist_workers,
    };

    match run_server(args, Upstream::from_memory(Arc::new(memory))).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[stream-chat] server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
