use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;

use esi_triage::{classifier, provision, server, Config, LineClient};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Listen address, overrides BIND_ADDR
    #[arg(long)]
    bind: Option<String>,

    /// Listen port, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    esi_triage::init_logger();
    let args = Args::parse();

    let mut config = Config::from_env().context("reading configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Set while the process is still single-threaded.
    if let Some(path) = provision::credentials_env_path(&config.credentials) {
        std::env::set_var(provision::CREDENTIALS_ENV, path);
        info!("{} set to {:?}", provision::CREDENTIALS_ENV, path);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?
        .block_on(serve(config, args.fresh))
}

async fn serve(config: Config, fresh: bool) -> anyhow::Result<()> {
    info!("=== Starting ESI triage service ===");
    let start_time = Instant::now();

    let manager = provision::bootstrap(&config, fresh)
        .await
        .context("provisioning model and credentials")?;

    let classifier = classifier::initialize(&config.classifier, &manager)
        .await
        .context("loading classifier")?;
    info!("=== Classifier ready (took {:.2?}) ===", start_time.elapsed());

    let sender = Arc::new(LineClient::new(&config.line));
    server::run(&config, classifier, sender).await
}
