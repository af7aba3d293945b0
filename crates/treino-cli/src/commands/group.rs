//! Group command handlers

use anyhow::{Context, Result};

use treino_core::Workouts;

use super::{confirm, find_group};
use crate::output::Output;

/// Create a new group
pub fn add(workouts: &mut Workouts, name: String, day: Option<String>, output: &Output) -> Result<()> {
    let id = workouts
        .add_group(&name, day)
        .context("Failed to create group")?;

    output.success(&format!("Created group: {}", id));
    if let Some(group) = workouts.group(id) {
        output.print_group(group);
    }
    Ok(())
}

/// List all groups
pub fn list(workouts: &Workouts, output: &Output) -> Result<()> {
    output.print_groups(workouts.groups());
    Ok(())
}

/// Show one group with its exercises
pub fn show(workouts: &Workouts, id: String, output: &Output) -> Result<()> {
    let group = find_group(workouts, &id)?;
    output.print_group(group);
    Ok(())
}

/// Rename a group, optionally changing its suggested day
pub fn rename(
    workouts: &mut Workouts,
    id: String,
    name: String,
    day: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut group = find_group(workouts, &id)?.clone();
    group.name = name;
    if let Some(day) = day {
        // An empty value clears the day
        group.suggested_day = Some(day);
    }
    let uuid = group.id;

    workouts
        .update_group(group)
        .context("Failed to update group")?;

    output.success("Group updated");
    if let Some(group) = workouts.group(uuid) {
        output.print_group(group);
    }
    Ok(())
}

/// Delete a group and its exercises
pub fn delete(workouts: &mut Workouts, id: String, yes: bool, output: &Output) -> Result<()> {
    let group = find_group(workouts, &id)?;
    let uuid = group.id;

    if output.should_prompt() && !yes {
        println!(
            "Delete group: {} - {} ({} exercise(s))",
            &uuid.to_string()[..8],
            group.name,
            group.exercise_count()
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    workouts.delete_group(uuid);

    output.success(&format!("Deleted group: {}", uuid));
    Ok(())
}
