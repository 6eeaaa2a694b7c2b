//! Mock identity server for local development.

use clap::Parser;

use demo_service::auth::mock::{self, DEFAULT_BIND_ADDRESS};
use demo_service::config::LoggingConfig;
use demo_service::http::{HttpServer, HttpServerConfig};
use demo_service::lifecycle::{spawn_signal_bridge, Supervisor, SupervisorConfig};
use demo_service::observability::init_logging;

#[derive(Parser)]
#[command(name = "mock-auth")]
#[command(about = "Mock identity server resolving every token to user 2", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind_address: String,

    /// Log at debug level
    #[arg(long, env = "DEBUG")]
    debug: bool,

    /// Human-readable logs instead of JSON
    #[arg(long, env = "DEV_MODE")]
    dev_mode: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        debug: cli.debug,
        dev_mode: cli.dev_mode,
    })?;

    let supervisor = Supervisor::new(SupervisorConfig::default());
    supervisor.register(HttpServer::new(
        HttpServerConfig {
            name: "mock-auth".to_string(),
            bind_address: cli.bind_address,
            max_connections: 1024,
            read_timeout: std::time::Duration::from_secs(5),
            write_timeout: std::time::Duration::from_secs(10),
        },
        mock::router(),
    ))?;
    let _signals = spawn_signal_bridge(supervisor.shutdown_signal())?;

    supervisor.run().await?;
    Ok(())
}
