use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use cideldill_server::{config::Config, context::Context, methods};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Path to the config file (eg. config.toml); built-in defaults apply
    /// when omitted
    #[clap(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt();
    #[cfg(debug_assertions)]
    let subscriber = subscriber.pretty();
    subscriber.init();

    let config: Config = match args.config {
        Some(path) => toml::from_str(&tokio::fs::read_to_string(&path).await?)?,
        None => Config::default(),
    };

    // the inspector holds live runtime values of the host; loopback only
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let context = Arc::new(Context::new(config));

    info!("inspector listening on http://{addr}");

    axum::Server::bind(&addr)
        .serve(methods::router(context).into_make_service())
        .await?;

    Ok(())
}
