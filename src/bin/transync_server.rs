//! Transync API Server binary

use clap::Parser;
use std::path::PathBuf;
use transync::api::{run_api_server, server::ApiConfig};

#[derive(Parser, Debug)]
#[command(name = "transync-server")]
#[command(version)]
#[command(about = "Transync API Server - HTTP interface for translation downloads, uploads and commits")]
#[command(long_about = r#"
Transync API Server

Endpoints:
  - GET  /api/v1/translations                          - Statistics
  - GET  /api/v1/download/:project/:component/:lang    - One translation (?format=xlsx|po|json)
  - GET  /api/v1/download/:project/:component          - Zip, or ?format=singlexlsx
  - POST /api/v1/upload/:project/:component/:lang      - Merge the request body
  - POST /api/v1/sync/:project/:component              - Re-read files (?force=true)
  - POST /api/v1/commit/:project/:component/:lang      - Commit pending edits
  - POST /api/v1/lock/:project/:component/:lang        - Editor lock (?user=)
  - GET  /health, /version, /

Example usage:
  transync-server --config transync.yaml --port 3000

  curl -o de.xlsx "http://localhost:3000/api/v1/download/demo/app/de?format=xlsx"
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TRANSYNC_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "TRANSYNC_PORT")]
    port: u16,

    /// Workspace configuration file
    #[arg(short, long, default_value = "transync.yaml", env = "TRANSYNC_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        config: args.config,
    };

    run_api_server(config).await
}
