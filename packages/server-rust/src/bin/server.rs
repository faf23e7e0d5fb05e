use anyhow::Context;
use clap::Parser;
use fluxdemo_server::cli::Args;
use fluxdemo_server::telemetry::{init_metrics, init_tracing};
use fluxdemo_server::NetworkModule;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Some(addr) = args.metrics_addr {
        init_metrics(addr)?;
        info!(%addr, "Prometheus exporter listening");
    }

    let server = args.server_config();
    if !server.security_enabled {
        info!("Security is disabled; every route is open");
    }

    let mut module = NetworkModule::new(args.network_config(), server);
    let port = module.start().await.context("failed to bind listener")?;
    info!(port, "fluxdemo server started");

    module
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
