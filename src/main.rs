use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;

use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core::judge::Judge;
use crate::core::toolchain::ToolchainRegistry;
use crate::core::workspace::WorkspaceManager;
use crate::grpc::models::judge_service_server::JudgeServiceServer;
use crate::grpc::services::JudgeServiceImpl;
use crate::native::ledger::FileLedger;
use crate::native::runner::NativeProcessRunner;

mod config;
mod constants;
mod core;
mod grpc;
mod native;

#[cfg(test)]
mod stubs;

#[tokio::main]
#[tracing::instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    let config = AppConfig::load()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let addr: SocketAddr = config.server.addr.parse()?;
    let ledger = Arc::new(FileLedger::open(&config.ledger.path).await?);
    let workspaces = WorkspaceManager::new(&config.workspace.root);
    tracing::info!("Workspaces are created under {}", workspaces.root().display());
    let judge = Judge::new(
        Arc::new(ToolchainRegistry::new(&config.toolchain)),
        workspaces,
        Arc::new(NativeProcessRunner::new(config.limits.output_limit_bytes)),
        ledger.clone(),
        config.judge_limits(),
    );

    let service = JudgeServiceServer::new(JudgeServiceImpl::new(judge));

    tracing::info!("gRPC server listening on {}", addr);
    Server::builder()
        .add_service(service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    ledger.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining in-flight requests");
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
