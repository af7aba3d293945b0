//! Status command handler

use anyhow::Result;

use treino_core::sync::{ActivationState, DirectoryLink};
use treino_core::{Config, Workouts};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(workouts: &Workouts, config: &Config, output: &Output) -> Result<()> {
    let groups = workouts.groups();
    let exercises: usize = groups.iter().map(|g| g.exercise_count()).sum();
    let images = groups
        .iter()
        .flat_map(|g| &g.exercises)
        .filter(|e| e.image_locator.is_some())
        .count();

    let link_active = workouts.sender().activation_state() == ActivationState::Activated;
    let pending = DirectoryLink::new(&config.link_dir).pending_contexts();
    let database = workouts
        .store()
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(in memory)".to_string());

    match output.format {
        OutputFormat::Json => {
            let pending_json: Vec<_> = pending
                .iter()
                .map(|(slot, written_at)| {
                    serde_json::json!({"slot": slot.name(), "written_at": written_at})
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "counts": {
                        "groups": groups.len(),
                        "exercises": exercises,
                        "images": images
                    },
                    "storage": {
                        "database": database,
                        "data_dir": config.data_dir,
                        "image_dir": config.image_dir(),
                        "mirror_dir": config.mirror_dir,
                        "mirror_image_dir": config.mirror_image_dir(),
                        "asset_cache_capacity": config.asset_cache_capacity,
                        "mirror_cache_capacity": config.mirror_cache_capacity
                    },
                    "sync": {
                        "enabled": config.sync_enabled,
                        "link_active": link_active,
                        "link_dir": config.link_dir,
                        "pending": pending_json
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", groups.len());
        }
        OutputFormat::Human => {
            println!("Treino Status");
            println!("=============");
            println!();
            println!("Contents:");
            println!("  Groups:    {}", groups.len());
            println!("  Exercises: {}", exercises);
            println!("  Images:    {}", images);
            println!();
            println!("Storage:");
            println!("  Database: {}", database);
            println!("  Images:   {}", config.image_dir().display());
            println!("  Mirror:   {}", config.mirror_image_dir().display());
            println!(
                "  Cache:    {} image(s) here, {} on mirror",
                config.asset_cache_capacity, config.mirror_cache_capacity
            );
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                match (config.sync_enabled, link_active) {
                    (false, _) => "disabled",
                    (true, true) => "enabled",
                    (true, false) => "enabled (link inactive)",
                }
            );
            println!("  Link:   {}", config.link_dir.display());
            if pending.is_empty() {
                println!("  Nothing waiting for the mirror");
            }
            for (slot, written_at) in &pending {
                println!(
                    "  Latest {} context: {}",
                    slot.name(),
                    written_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}
