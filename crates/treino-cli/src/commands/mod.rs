//! Command handlers

pub mod config;
pub mod exercise;
pub mod group;
pub mod mirror;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};
use uuid::Uuid;

use treino_core::{WorkoutError, WorkoutGroup, Workouts};

/// Resolve a group ID (full UUID or unique prefix) to an existing group
pub fn find_group<'a>(workouts: &'a Workouts, id: &str) -> Result<&'a WorkoutGroup> {
    let uuid = resolve_id(
        id,
        "group",
        workouts.groups().iter().map(|g| (g.id, g.name.as_str())),
    )?;
    workouts
        .group(uuid)
        .ok_or_else(|| WorkoutError::GroupNotFound(uuid).into())
}

/// Resolve an exercise ID (full UUID or unique prefix) within a group
pub fn find_exercise_id(group: &WorkoutGroup, id: &str) -> Result<Uuid> {
    let uuid = resolve_id(
        id,
        "exercise",
        group.exercises.iter().map(|e| (e.id, e.name.as_str())),
    )?;
    if group.exercise(uuid).is_none() {
        return Err(WorkoutError::ExerciseNotFound(uuid).into());
    }
    Ok(uuid)
}

/// Match `id` against candidates: a full UUID first, then a unique prefix
fn resolve_id<'a>(
    id: &str,
    kind: &str,
    candidates: impl Iterator<Item = (Uuid, &'a str)>,
) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let prefix = id.to_lowercase();
    let matches: Vec<_> = candidates
        .filter(|(uuid, _)| uuid.to_string().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, id),
        1 => Ok(matches[0].0),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, id);
            for (uuid, name) in &matches {
                eprintln!("  {} - {}", uuid, name);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Ask for confirmation on an interactive terminal
///
/// Returns `false` when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{self, IsTerminal, Write};

    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
