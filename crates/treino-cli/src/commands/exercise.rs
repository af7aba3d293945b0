//! Exercise command handlers

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use treino_core::{ExerciseDraft, Locator, WorkoutError, Workouts};

use super::{confirm, find_exercise_id, find_group};
use crate::output::Output;

/// Fields for a new exercise
#[derive(Args, Debug, Clone)]
pub struct NewExercise {
    /// Exercise name
    pub name: String,
    /// Number of sets
    #[arg(short, long)]
    pub sets: u32,
    /// Repetitions per set
    #[arg(short, long)]
    pub reps: u32,
    /// Load in kilograms
    #[arg(short, long)]
    pub weight: Option<f64>,
    /// Free-form notes
    #[arg(short, long)]
    pub notes: Option<String>,
    /// Image file to attach
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

/// Fields to change on an existing exercise; omitted fields are kept
#[derive(Args, Debug, Clone, Default)]
pub struct ExerciseChanges {
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub sets: Option<u32>,
    #[arg(short, long)]
    pub reps: Option<u32>,
    /// Load in kilograms (negative clears it)
    #[arg(short, long, allow_negative_numbers = true)]
    pub weight: Option<f64>,
    /// Notes (empty clears them)
    #[arg(short, long)]
    pub notes: Option<String>,
    /// Replace the image with this file
    #[arg(short, long, conflicts_with = "clear_image")]
    pub image: Option<PathBuf>,
    /// Remove the image
    #[arg(long)]
    pub clear_image: bool,
}

/// Add an exercise to a group
pub fn add(workouts: &mut Workouts, group: String, fields: NewExercise, output: &Output) -> Result<()> {
    let group_id = find_group(workouts, &group)?.id;

    let mut draft = ExerciseDraft::new(fields.name, fields.sets, fields.reps);
    if let Some(weight) = fields.weight {
        draft = draft.with_weight(weight);
    }
    if let Some(notes) = fields.notes {
        draft = draft.with_notes(notes);
    }
    if let Some(ref path) = fields.image {
        draft = draft.with_image(store_image_file(workouts, path)?);
    }

    let id = workouts
        .add_exercise(draft, group_id)
        .context("Failed to add exercise")?
        .ok_or(WorkoutError::GroupNotFound(group_id))?;

    output.success(&format!("Added exercise: {}", id));
    if let Some(group) = workouts.group(group_id) {
        output.print_exercises(group);
    }
    Ok(())
}

/// List the exercises of a group
pub fn list(workouts: &Workouts, group: String, output: &Output) -> Result<()> {
    let group = find_group(workouts, &group)?;
    output.print_exercises(group);
    Ok(())
}

/// Edit an exercise in place
pub fn edit(
    workouts: &mut Workouts,
    group: String,
    id: String,
    changes: ExerciseChanges,
    output: &Output,
) -> Result<()> {
    let found = find_group(workouts, &group)?;
    let group_id = found.id;
    let exercise_id = find_exercise_id(found, &id)?;
    let mut exercise = found
        .exercise(exercise_id)
        .cloned()
        .ok_or(WorkoutError::ExerciseNotFound(exercise_id))?;

    if let Some(name) = changes.name {
        exercise.name = name;
    }
    if let Some(sets) = changes.sets {
        exercise.sets = sets;
    }
    if let Some(reps) = changes.reps {
        exercise.reps = reps;
    }
    if let Some(weight) = changes.weight {
        exercise.weight = (weight >= 0.0).then_some(weight);
    }
    if let Some(notes) = changes.notes {
        exercise.notes = Some(notes);
    }
    if changes.clear_image {
        exercise.image_locator = None;
    } else if let Some(ref path) = changes.image {
        exercise.image_locator = Some(store_image_file(workouts, path)?);
    }

    workouts
        .update_exercise(exercise, group_id)
        .context("Failed to update exercise")?;

    output.success("Exercise updated");
    if let Some(group) = workouts.group(group_id) {
        output.print_exercises(group);
    }
    Ok(())
}

/// Delete an exercise from a group
pub fn delete(
    workouts: &mut Workouts,
    group: String,
    id: String,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let found = find_group(workouts, &group)?;
    let group_id = found.id;
    let exercise_id = find_exercise_id(found, &id)?;

    if output.should_prompt() && !yes {
        if let Some(exercise) = found.exercise(exercise_id) {
            println!("Delete exercise: {} - {}", &exercise_id.to_string()[..8], exercise.name);
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    workouts.delete_exercise(exercise_id, group_id);

    output.success(&format!("Deleted exercise: {}", exercise_id));
    Ok(())
}

/// Move exercises within a group
///
/// Positions are 1-based as shown by `exercise list`; the moved exercises
/// end up as a block starting at position `to`.
pub fn move_to(
    workouts: &mut Workouts,
    group: String,
    from: Vec<usize>,
    to: usize,
    output: &Output,
) -> Result<()> {
    if from.contains(&0) || to == 0 {
        bail!("Positions start at 1");
    }
    let group_id = find_group(workouts, &group)?.id;

    let from: Vec<usize> = from.iter().map(|p| p - 1).collect();
    workouts.move_exercise(&from, to - 1, group_id);

    output.success("Exercises moved");
    if let Some(group) = workouts.group(group_id) {
        output.print_exercises(group);
    }
    Ok(())
}

fn store_image_file(workouts: &Workouts, path: &Path) -> Result<Locator> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(workouts.store_image(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use std::sync::Arc;
    use tempfile::TempDir;
    use treino_core::sync::DirectoryLink;
    use treino_core::Config;

    fn open(temp: &TempDir) -> (Workouts, String) {
        let config = Config::in_dir(temp.path());
        let link = Arc::new(DirectoryLink::new(&config.link_dir));
        let mut workouts = Workouts::open_with_config(&config, link).unwrap();
        let id = workouts.add_group("Upper", None).unwrap();
        (workouts, id.to_string())
    }

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    fn new_exercise(name: &str) -> NewExercise {
        NewExercise {
            name: name.to_string(),
            sets: 3,
            reps: 10,
            weight: None,
            notes: None,
            image: None,
        }
    }

    fn names(workouts: &Workouts) -> Vec<String> {
        workouts.groups()[0]
            .exercises
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_add_with_image() {
        let temp = TempDir::new().unwrap();
        let (mut workouts, group) = open(&temp);
        let image = temp.path().join("photo.jpg");
        fs::write(&image, b"jpeg bytes").unwrap();

        let mut fields = new_exercise("Curl");
        fields.image = Some(image);
        add(&mut workouts, group, fields, &quiet()).unwrap();

        let exercise = &workouts.groups()[0].exercises[0];
        let locator = exercise.image_locator.as_ref().unwrap();
        assert_eq!(&*workouts.resolve_image(locator).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_add_with_missing_image_file_fails() {
        let temp = TempDir::new().unwrap();
        let (mut workouts, group) = open(&temp);

        let mut fields = new_exercise("Curl");
        fields.image = Some(temp.path().join("nope.jpg"));

        assert!(add(&mut workouts, group, fields, &quiet()).is_err());
        assert!(workouts.groups()[0].exercises.is_empty());
    }

    #[test]
    fn test_edit_keeps_unchanged_fields() {
        let temp = TempDir::new().unwrap();
        let (mut workouts, group) = open(&temp);
        let mut fields = new_exercise("Press");
        fields.weight = Some(40.0);
        fields.notes = Some("strict".into());
        add(&mut workouts, group.clone(), fields, &quiet()).unwrap();
        let id = workouts.groups()[0].exercises[0].id.to_string();

        let changes = ExerciseChanges {
            reps: Some(8),
            notes: Some(String::new()),
            ..Default::default()
        };
        edit(&mut workouts, group, id, changes, &quiet()).unwrap();

        let exercise = &workouts.groups()[0].exercises[0];
        assert_eq!(exercise.name, "Press");
        assert_eq!(exercise.reps, 8);
        assert_eq!(exercise.weight, Some(40.0));
        assert_eq!(exercise.notes, None);
    }

    #[test]
    fn test_move_uses_positions() {
        let temp = TempDir::new().unwrap();
        let (mut workouts, group) = open(&temp);
        for name in ["a", "b", "c", "d"] {
            add(&mut workouts, group.clone(), new_exercise(name), &quiet()).unwrap();
        }

        move_to(&mut workouts, group.clone(), vec![2], 4, &quiet()).unwrap();
        assert_eq!(names(&workouts), vec!["a", "c", "d", "b"]);

        assert!(move_to(&mut workouts, group, vec![0], 1, &quiet()).is_err());
    }

    #[test]
    fn test_delete_exercise() {
        let temp = TempDir::new().unwrap();
        let (mut workouts, group) = open(&temp);
        add(&mut workouts, group.clone(), new_exercise("Dip"), &quiet()).unwrap();
        let id = workouts.groups()[0].exercises[0].id.to_string();

        delete(&mut workouts, group, id[..8].to_string(), true, &quiet()).unwrap();
        assert!(workouts.groups()[0].exercises.is_empty());
    }
}
