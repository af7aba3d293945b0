//! Data models for Treino
//!
//! Defines the core data structures: WorkoutGroup, Exercise and the asset
//! Locator that links an exercise to its image.
//!
//! Field names are serialized in camelCase and optional fields are omitted
//! when empty, so the same encoding is used for the local blob and the
//! collection payload sent to the mirror device.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised for user-supplied input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkoutError {
    #[error("Invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Workout group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("Exercise not found: {0}")]
    ExerciseNotFound(Uuid),
}

impl WorkoutError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        WorkoutError::Validation { field, reason }
    }
}

/// Extension used for generated image locators
const IMAGE_EXTENSION: &str = "jpg";

/// Stable reference to a binary asset
///
/// A locator is the asset's file name. The same name is used as the cache
/// key and as the file name inside a device's documents directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Create a locator from an existing file name
    pub fn new(name: impl Into<String>) -> Result<Self, WorkoutError> {
        let name = name.into();
        if !Self::is_valid_name(&name) {
            return Err(WorkoutError::invalid(
                "image locator",
                "must be a plain file name",
            ));
        }
        Ok(Self(name))
    }

    /// Generate a fresh locator for a new image
    pub fn generate() -> Self {
        Self(format!("{}.{}", Uuid::new_v4(), IMAGE_EXTENSION))
    }

    /// Check whether a name can be used as a file name in a flat directory
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0'])
    }

    /// Whether this locator can be resolved to a file
    ///
    /// Locators decoded from a payload are not checked on the way in.
    pub fn is_valid(&self) -> bool {
        Self::is_valid_name(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named group of exercises, e.g. "Upper body"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutGroup {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Day label suggested for this workout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_day: Option<String>,
    /// Exercises in display order
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl WorkoutGroup {
    /// Create a new empty group
    pub fn new(
        name: impl AsRef<str>,
        suggested_day: Option<String>,
    ) -> Result<Self, WorkoutError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: required_name(name.as_ref(), "group name")?,
            suggested_day: optional_text(suggested_day),
            exercises: Vec::new(),
        })
    }

    /// Validate and normalize a group supplied by a caller
    ///
    /// Checks the name, every exercise, and that exercise ids are unique.
    pub fn validated(self) -> Result<Self, WorkoutError> {
        let exercises = self
            .exercises
            .into_iter()
            .map(Exercise::validated)
            .collect::<Result<Vec<_>, _>>()?;

        for (i, exercise) in exercises.iter().enumerate() {
            if exercises[..i].iter().any(|e| e.id == exercise.id) {
                return Err(WorkoutError::invalid("exercises", "duplicate exercise id"));
            }
        }

        Ok(Self {
            id: self.id,
            name: required_name(&self.name, "group name")?,
            suggested_day: optional_text(self.suggested_day),
            exercises,
        })
    }

    /// Find an exercise by ID
    pub fn exercise(&self, id: Uuid) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn exercise_count(&self) -> usize {
        self.exercises.len()
    }

    /// Image locators of the first exercises that have one, in order
    ///
    /// Used for thumbnail strips; `limit` caps how many are returned.
    pub fn image_locators(&self, limit: usize) -> Vec<&Locator> {
        self.exercises
            .iter()
            .filter_map(|e| e.image_locator.as_ref())
            .take(limit)
            .collect()
    }
}

/// A single exercise within a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Number of sets (at least 1)
    pub sets: u32,
    /// Repetitions per set (at least 1)
    pub reps: u32,
    /// Load in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Image asset attached to this exercise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_locator: Option<Locator>,
}

impl Exercise {
    /// Create an exercise from validated draft fields with a fresh ID
    pub fn from_draft(draft: ExerciseDraft) -> Result<Self, WorkoutError> {
        Self {
            id: Uuid::new_v4(),
            name: draft.name,
            sets: draft.sets,
            reps: draft.reps,
            weight: draft.weight,
            notes: draft.notes,
            image_locator: draft.image_locator,
        }
        .validated()
    }

    /// Validate and normalize fields; the ID is kept as-is
    pub fn validated(self) -> Result<Self, WorkoutError> {
        if self.sets == 0 {
            return Err(WorkoutError::invalid("sets", "must be at least 1"));
        }
        if self.reps == 0 {
            return Err(WorkoutError::invalid("reps", "must be at least 1"));
        }
        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(WorkoutError::invalid(
                    "weight",
                    "must be a non-negative number",
                ));
            }
        }

        Ok(Self {
            id: self.id,
            name: required_name(&self.name, "exercise name")?,
            sets: self.sets,
            reps: self.reps,
            weight: self.weight,
            notes: optional_text(self.notes),
            image_locator: self.image_locator,
        })
    }

    /// One-line summary such as `3 × 12 · 20.0 kg`
    pub fn summary(&self) -> String {
        match self.weight {
            Some(weight) => format!("{} × {} · {:.1} kg", self.sets, self.reps, weight),
            None => format!("{} × {}", self.sets, self.reps),
        }
    }
}

/// Fields for a new exercise, before an ID is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseDraft {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: Option<f64>,
    pub notes: Option<String>,
    pub image_locator: Option<Locator>,
}

impl ExerciseDraft {
    pub fn new(name: impl Into<String>, sets: u32, reps: u32) -> Self {
        Self {
            name: name.into(),
            sets,
            reps,
            weight: None,
            notes: None,
            image_locator: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_image(mut self, locator: Locator) -> Self {
        self.image_locator = Some(locator);
        self
    }
}

/// Reorder `items` by moving the elements at `from` so that the moved block
/// starts at index `to` of the result
///
/// Indices past the end are ignored, duplicates count once, and `to` is
/// clamped to the length of the remaining sequence. Moved elements keep
/// their relative order. `[a, b, c, d]` moving `{1}` to `3` yields
/// `[a, c, d, b]`.
pub fn move_elements<T>(items: &mut Vec<T>, from: &[usize], to: usize) {
    let mut indices: Vec<usize> = from.iter().copied().filter(|&i| i < items.len()).collect();
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() {
        return;
    }

    let mut moved = Vec::with_capacity(indices.len());
    let mut kept = Vec::with_capacity(items.len() - indices.len());
    let mut next = indices.iter().peekable();
    for (i, item) in items.drain(..).enumerate() {
        if next.peek() == Some(&&i) {
            next.next();
            moved.push(item);
        } else {
            kept.push(item);
        }
    }

    let at = to.min(kept.len());
    let tail = kept.split_off(at);
    kept.extend(moved);
    kept.extend(tail);
    *items = kept;
}

/// Trim a required name, rejecting blank input
fn required_name(name: &str, field: &'static str) -> Result<String, WorkoutError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WorkoutError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text is stored as absent
fn optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_new() {
        let group = WorkoutGroup::new("  Upper body ", Some("Monday".to_string())).unwrap();
        assert_eq!(group.name, "Upper body");
        assert_eq!(group.suggested_day.as_deref(), Some("Monday"));
        assert!(group.exercises.is_empty());
    }

    #[test]
    fn test_group_new_rejects_blank_name() {
        let err = WorkoutGroup::new("   ", None).unwrap_err();
        assert!(matches!(
            err,
            WorkoutError::Validation {
                field: "group name",
                ..
            }
        ));
    }

    #[test]
    fn test_blank_day_is_absent() {
        let group = WorkoutGroup::new("Legs", Some(" ".to_string())).unwrap();
        assert!(group.suggested_day.is_none());
    }

    #[test]
    fn test_group_ids_are_unique() {
        let a = WorkoutGroup::new("A", None).unwrap();
        let b = WorkoutGroup::new("A", None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_exercise_from_draft() {
        let draft = ExerciseDraft::new("Bench press", 3, 10)
            .with_weight(60.0)
            .with_notes("  ");
        let exercise = Exercise::from_draft(draft).unwrap();
        assert_eq!(exercise.name, "Bench press");
        assert_eq!(exercise.weight, Some(60.0));
        assert!(exercise.notes.is_none());
    }

    #[test]
    fn test_exercise_rejects_zero_sets_and_reps() {
        let err = Exercise::from_draft(ExerciseDraft::new("Squat", 0, 5)).unwrap_err();
        assert!(matches!(err, WorkoutError::Validation { field: "sets", .. }));

        let err = Exercise::from_draft(ExerciseDraft::new("Squat", 5, 0)).unwrap_err();
        assert!(matches!(err, WorkoutError::Validation { field: "reps", .. }));
    }

    #[test]
    fn test_exercise_rejects_negative_weight() {
        let draft = ExerciseDraft::new("Row", 3, 8).with_weight(-1.0);
        assert!(Exercise::from_draft(draft).is_err());

        let draft = ExerciseDraft::new("Row", 3, 8).with_weight(f64::NAN);
        assert!(Exercise::from_draft(draft).is_err());
    }

    #[test]
    fn test_validated_rejects_duplicate_exercise_ids() {
        let mut group = WorkoutGroup::new("Push", None).unwrap();
        let exercise = Exercise::from_draft(ExerciseDraft::new("Dip", 3, 8)).unwrap();
        group.exercises = vec![exercise.clone(), exercise];

        assert!(group.validated().is_err());
    }

    #[test]
    fn test_exercise_summary() {
        let mut exercise = Exercise::from_draft(ExerciseDraft::new("Curl", 3, 12)).unwrap();
        assert_eq!(exercise.summary(), "3 × 12");

        exercise.weight = Some(12.5);
        assert_eq!(exercise.summary(), "3 × 12 · 12.5 kg");
    }

    #[test]
    fn test_image_locators_limit() {
        let mut group = WorkoutGroup::new("Full body", None).unwrap();
        for i in 0..6 {
            let mut draft = ExerciseDraft::new(format!("Ex {}", i), 1, 1);
            if i != 2 {
                draft = draft.with_image(Locator::generate());
            }
            group
                .exercises
                .push(Exercise::from_draft(draft).unwrap());
        }

        let thumbs = group.image_locators(4);
        assert_eq!(thumbs.len(), 4);
        assert_eq!(
            Some(thumbs[2]),
            group.exercises[3].image_locator.as_ref()
        );
    }

    #[test]
    fn test_locator_validation() {
        assert!(Locator::new("photo.jpg").is_ok());
        assert!(Locator::new("").is_err());
        assert!(Locator::new("..").is_err());
        assert!(Locator::new("../etc/passwd").is_err());
        assert!(Locator::new("a\\b.jpg").is_err());

        let generated = Locator::generate();
        assert!(generated.is_valid());
        assert!(generated.as_str().ends_with(".jpg"));
    }

    #[test]
    fn test_move_single_forward() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        move_elements(&mut items, &[1], 3);
        assert_eq!(items, vec!['a', 'c', 'd', 'b']);
    }

    #[test]
    fn test_move_to_front() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        move_elements(&mut items, &[3], 0);
        assert_eq!(items, vec!['d', 'a', 'b', 'c']);
    }

    #[test]
    fn test_move_multiple_keeps_relative_order() {
        let mut items = vec!['a', 'b', 'c', 'd', 'e'];
        move_elements(&mut items, &[3, 0], 1);
        assert_eq!(items, vec!['b', 'a', 'd', 'c', 'e']);
    }

    #[test]
    fn test_move_ignores_out_of_range() {
        let mut items = vec!['a', 'b', 'c'];
        move_elements(&mut items, &[7], 0);
        assert_eq!(items, vec!['a', 'b', 'c']);

        move_elements(&mut items, &[0], 99);
        assert_eq!(items, vec!['b', 'c', 'a']);
    }

    #[test]
    fn test_group_serialization_is_field_tagged() {
        let mut group = WorkoutGroup::new("Pull", None).unwrap();
        let exercise = Exercise::from_draft(
            ExerciseDraft::new("Chin-up", 4, 6).with_image(Locator::new("chin.jpg").unwrap()),
        )
        .unwrap();
        group.exercises.push(exercise);

        let json = serde_json::to_value(&group).unwrap();
        assert!(json.get("suggestedDay").is_none());
        assert_eq!(json["exercises"][0]["imageLocator"], "chin.jpg");
        assert!(json["exercises"][0].get("weight").is_none());
    }

    #[test]
    fn test_group_ignores_unknown_fields() {
        let json = r#"{
            "id": "6f1d2c9e-3b5a-4c8e-9f0a-1b2c3d4e5f60",
            "name": "Core",
            "color": "blue",
            "exercises": [
                {"id": "0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d", "name": "Plank", "sets": 3, "reps": 1, "tempo": "slow"}
            ]
        }"#;
        let group: WorkoutGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.name, "Core");
        assert_eq!(group.exercises[0].name, "Plank");
        assert!(group.exercises[0].weight.is_none());
    }
}
