//! Sync command handler

use anyhow::{bail, Result};

use treino_core::sync::SendOutcome;
use treino_core::{Config, Workouts};

use crate::output::Output;

/// Push the current collection and its images to the mirror again
pub fn push(workouts: &Workouts, config: &Config, output: &Output) -> Result<()> {
    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             treino config set sync_enabled true"
        );
    }

    match workouts.resync() {
        SendOutcome::Sent => output.success("Collection sent to mirror"),
        SendOutcome::ContextUpdated => output.success(&format!(
            "Collection queued for mirror ({} group(s))",
            workouts.groups().len()
        )),
        SendOutcome::Skipped => {
            bail!("Link to the mirror is not active. Check {}", config.link_dir.display())
        }
        SendOutcome::Failed => bail!("Failed to hand the collection to the link"),
    }

    Ok(())
}
