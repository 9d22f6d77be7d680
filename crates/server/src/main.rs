use clap::Parser;
use server::{FederatedModel, ServerConfig};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fedsync-server")]
#[command(about = "Federated model coordination server")]
struct Cli {
    /// Root directory for models, updates and uploaded files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON model descriptor used to seed the store on first run
    #[arg(short, long)]
    model: Option<PathBuf>,

    #[arg(long)]
    host: Option<IpAddr>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Max upload size in MB
    #[arg(long)]
    max_upload_mb: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::default();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(mb) = cli.max_upload_mb {
        config.max_upload_mb = mb;
    }

    let model = match cli.model {
        Some(path) => FederatedModel::from_file(&path).await?,
        None => FederatedModel::new("default", Vec::new()),
    };

    server::run(model, config).await
}
