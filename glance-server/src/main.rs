use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use glance_core::{load_captioner, CaptionService};
use hf_hub::api::tokio::Api;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod archive;
mod config;
mod error;
mod gallery;
mod page;
mod routes;
mod shell;

use config::Args;
use gallery::Gallery;
use routes::AppState;
use shell::Shell;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.shell_config();

    // --- Load the model once, before accepting requests ---
    let captioner = load_captioner(args.model_source(), Api::new()?, args.device_map()).await?;
    let service = CaptionService::new(captioner);
    let shell = Shell::new(service, &config)?;

    let client = reqwest::Client::new();
    let gallery = if config.show_examples {
        let gallery = Gallery::examples();
        info!("captioning example images");
        gallery.warm(&shell, &client).await;
        Some(Arc::new(gallery))
    } else {
        None
    };

    let app = routes::router(AppState {
        shell,
        gallery,
        client,
    });

    // --- Start the server ---
    let bind_address = args.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!("started server on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
