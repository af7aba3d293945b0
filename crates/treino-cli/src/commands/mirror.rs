//! Mirror command handler
//!
//! Plays the mirror device: reads the contexts the authoritative side left
//! in the link directory, applies them, and shows the mirrored collection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use treino_core::sync::DirectoryInbox;
use treino_core::{AssetCache, Config, SyncReceiver};

use crate::output::Output;

/// How often `--watch` looks for new contexts
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Apply pending contexts and print the mirror, optionally following updates
pub async fn run(config: &Config, watch: bool, output: &Output) -> Result<()> {
    let assets = Arc::new(AssetCache::new(
        config.mirror_image_dir(),
        config.mirror_cache_capacity,
    ));
    let mut receiver = SyncReceiver::new(assets);
    let mut inbox = DirectoryInbox::new(&config.link_dir);
    let mut updates = receiver.subscribe();

    let applied = receiver.pump(&mut inbox);
    debug!("Applied {} pending deliveries", applied);
    output.print_mirror(&updates.borrow_and_update(), receiver.assets());

    if !watch {
        return Ok(());
    }

    output.message("Watching for updates (Ctrl-C to stop)...");
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if receiver.pump(&mut inbox) == 0 {
                    continue;
                }
                if updates.has_changed().unwrap_or(false) {
                    let snapshot = updates.borrow_and_update().clone();
                    output.print_mirror(&snapshot, receiver.assets());
                }
            }
            _ = &mut shutdown => break,
        }
    }

    let stats = receiver.stats();
    output.message(&format!(
        "Applied {} collection(s), stored {} image(s), rejected {}",
        stats.collections_applied, stats.assets_stored, stats.rejected
    ));
    Ok(())
}
