//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use treino_core::{AssetCache, Exercise, WorkoutGroup};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single group with its exercises
    pub fn print_group(&self, group: &WorkoutGroup) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:   {}", group.id);
                println!("Name: {}", group.name);
                if let Some(ref day) = group.suggested_day {
                    println!("Day:  {}", day);
                }
                println!();
                print_exercise_lines(&group.exercises, |_| None);
            }
            OutputFormat::Json => print_json(group),
            OutputFormat::Quiet => println!("{}", group.id),
        }
    }

    /// Print a list of groups
    pub fn print_groups(&self, groups: &[WorkoutGroup]) {
        match self.format {
            OutputFormat::Human => {
                if groups.is_empty() {
                    println!("No workout groups yet.");
                    return;
                }
                for group in groups {
                    println!(
                        "{} | {} | {} | {} exercise(s)",
                        short_id(&group.id),
                        truncate(&group.name, 30),
                        group.suggested_day.as_deref().unwrap_or("-"),
                        group.exercise_count()
                    );
                }
                println!("\n{} group(s)", groups.len());
            }
            OutputFormat::Json => print_json(&groups),
            OutputFormat::Quiet => {
                for group in groups {
                    println!("{}", group.id);
                }
            }
        }
    }

    /// Print the exercises of one group
    pub fn print_exercises(&self, group: &WorkoutGroup) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", group.name);
                println!();
                print_exercise_lines(&group.exercises, |_| None);
            }
            OutputFormat::Json => print_json(&group.exercises),
            OutputFormat::Quiet => {
                for exercise in &group.exercises {
                    println!("{}", exercise.id);
                }
            }
        }
    }

    /// Print the mirrored collection, marking images the mirror cannot show
    pub fn print_mirror(&self, groups: &[WorkoutGroup], assets: &AssetCache) {
        match self.format {
            OutputFormat::Human => {
                if groups.is_empty() {
                    println!("Nothing mirrored yet.");
                    return;
                }
                for group in groups {
                    match group.suggested_day {
                        Some(ref day) => println!("── {} ({}) ──", group.name, day),
                        None => println!("── {} ──", group.name),
                    }
                    if let Some(strip) = thumbnail_strip(group, assets) {
                        println!("     {}", strip);
                    }
                    print_exercise_lines(&group.exercises, |exercise| {
                        exercise.image_locator.as_ref().map(|locator| {
                            if assets.get(locator).is_some() {
                                "[image]"
                            } else {
                                "[image missing]"
                            }
                        })
                    });
                    println!();
                }
                println!("{} group(s) mirrored", groups.len());
            }
            OutputFormat::Json => print_json(&groups),
            OutputFormat::Quiet => {
                for group in groups {
                    println!("{}", group.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Number of thumbnails shown under a mirrored group's title
const THUMBNAIL_STRIP_LEN: usize = 4;

/// `[img] [img] [ ? ]` for the group's first images, `None` when it has none
fn thumbnail_strip(group: &WorkoutGroup, assets: &AssetCache) -> Option<String> {
    let thumbs = group.image_locators(THUMBNAIL_STRIP_LEN);
    if thumbs.is_empty() {
        return None;
    }

    let cells: Vec<&str> = thumbs
        .into_iter()
        .map(|locator| {
            if assets.get(locator).is_some() {
                "[img]"
            } else {
                "[ ? ]"
            }
        })
        .collect();
    Some(cells.join(" "))
}

/// Numbered exercise lines; `marker` adds a trailing tag per exercise
fn print_exercise_lines(exercises: &[Exercise], marker: impl Fn(&Exercise) -> Option<&'static str>) {
    if exercises.is_empty() {
        println!("  (no exercises)");
        return;
    }

    for (position, exercise) in exercises.iter().enumerate() {
        let tag = marker(exercise)
            .map(|m| format!(" {}", m))
            .unwrap_or_default();
        println!(
            "{:>3}. {} | {:<28} {}{}",
            position + 1,
            short_id(&exercise.id),
            truncate(&exercise.name, 28),
            exercise.summary(),
            tag
        );
        if let Some(ref notes) = exercise.notes {
            println!("               {}", truncate_line(notes, 60));
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to format output: {}", e),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
