//! ethnia_api - HTTP analysis service
//!
//! This daemon:
//! 1. Loads the detector and classifier models once
//! 2. Serves the analyze endpoint until Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use ethnia::api::{ApiConfig, ApiServer};
use ethnia::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "ethnia_api", about = "Ethnicity analysis HTTP service")]
struct Args {
    /// JSON config file.
    #[arg(long, env = "ETHNIA_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address override (host:port).
    #[arg(long)]
    addr: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = ServiceConfig::load_from(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.api_addr = addr;
    }

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };
    let api_handle = ApiServer::new(api_config, config).spawn()?;
    log::info!("analyze api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("ethnia_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
