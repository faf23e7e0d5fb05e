//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::network::{NetworkConfig, TlsConfig};
use crate::service::{ExportConfig, ServerConfig};
use crate::telemetry::LogFormat;

/// fluxdemo HTTP server.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, env = "FLUXDEMO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port; 0 picks a free one.
    #[arg(long, env = "FLUXDEMO_PORT", default_value_t = 8080)]
    pub port: u16,

    /// PEM certificate chain. TLS is enabled when both cert and key are set.
    #[arg(long, env = "FLUXDEMO_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "FLUXDEMO_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Allowed CORS origins, comma separated; `*` allows any.
    #[arg(long, env = "FLUXDEMO_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "FLUXDEMO_REQUEST_TIMEOUT_SECS", default_value_t = 180)]
    pub request_timeout_secs: u64,

    /// Enforce authentication and the route access policy.
    #[arg(
        long,
        env = "FLUXDEMO_SECURITY_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub security_enabled: bool,

    #[arg(long, env = "FLUXDEMO_STREAM_DELAY_MS", default_value_t = 100)]
    pub stream_delay_ms: u64,

    #[arg(long, env = "FLUXDEMO_CREATE_DELAY_MS", default_value_t = 200)]
    pub create_delay_ms: u64,

    /// Concurrent blocking stage simulations.
    #[arg(long, env = "FLUXDEMO_WORKER_POOL_SIZE", default_value_t = 16)]
    pub worker_pool_size: usize,

    #[arg(long, env = "FLUXDEMO_MAX_CONCURRENT_EXPORTS", default_value_t = 64)]
    pub max_concurrent_exports: u32,

    /// Query, process and generate stage durations; missing entries keep their default.
    #[arg(
        long,
        env = "FLUXDEMO_STAGE_MS",
        value_delimiter = ',',
        default_values_t = [2000u64, 3000, 2000]
    )]
    pub stage_ms: Vec<u64>,

    #[arg(long, env = "FLUXDEMO_BATCH_COUNT", default_value_t = 5)]
    pub batch_count: u32,

    #[arg(long, env = "FLUXDEMO_BATCH_MS", default_value_t = 1000)]
    pub batch_ms: u64,

    #[arg(long, env = "FLUXDEMO_BATCH_TIMEOUT_SECS", default_value_t = 120)]
    pub batch_timeout_secs: u64,

    /// Probability that a blocking export fails after its stages.
    #[arg(long, env = "FLUXDEMO_FAILURE_RATE", default_value_t = 0.10)]
    pub failure_rate: f64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "FLUXDEMO_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "FLUXDEMO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Args {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }

    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let defaults = ExportConfig::default();
        let stage = |index: usize, fallback: Duration| {
            self.stage_ms
                .get(index)
                .map_or(fallback, |ms| Duration::from_millis(*ms))
        };
        ServerConfig {
            stream_delay: Duration::from_millis(self.stream_delay_ms),
            create_delay: Duration::from_millis(self.create_delay_ms),
            security_enabled: self.security_enabled,
            worker_pool_size: self.worker_pool_size,
            max_concurrent_exports: self.max_concurrent_exports,
            export: ExportConfig {
                query_duration: stage(0, defaults.query_duration),
                process_duration: stage(1, defaults.process_duration),
                generate_duration: stage(2, defaults.generate_duration),
                batch_count: self.batch_count,
                batch_duration: Duration::from_millis(self.batch_ms),
                batch_timeout: Duration::from_secs(self.batch_timeout_secs),
                failure_rate: self.failure_rate,
            },
        }
    }
}
