use std::sync::{mpsc, Arc};

use wakemap_core::config::ServerConfig;
use wakemap_core::logs;
use wakemap_core::server::WakemapServer;
use wakemap_core::storage::Storage;

// `WAKEMAP_DB=/tmp/wakemap.db PORT=8080 cargo run --example server`
pub fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    logs::init(&config.log_dir)?;

    let storage = Arc::new(Storage::open(&config.db_path)?);
    let mut server = WakemapServer::new(&config, storage);
    server.start()?;

    println!("================================================");
    println!("[wakemap dev server]:  {}", server.url());
    println!("  db:                  {}", config.db_path.display());
    println!("  try: curl -X POST '{}/api/sim/broughton?speed_kn=8'", server.url());
    println!("Press Ctrl+C to exit");

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv()?;

    println!("Ctrl+C pressed. Stopping server...");
    server.stop();
    Ok(())
}
