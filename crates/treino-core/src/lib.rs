//! Treino Core Library
//!
//! This crate provides the core of Treino, a workout tracker whose
//! collection lives on one authoritative device and is mirrored to a
//! companion device.
//!
//! # Architecture
//!
//! - **Local store**: the whole collection as one JSON blob in SQLite
//! - **Asset cache**: exercise images on disk with a bounded in-memory LRU
//! - **Sync**: full snapshots pushed over a link, latest value wins
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let link = Arc::new(DirectoryLink::new(&config.link_dir));
//! let mut workouts = Workouts::open_with_config(&config, link)?;
//!
//! let push = workouts.add_group("Push", Some("Monday".into()))?;
//! workouts.add_exercise(ExerciseDraft::new("Bench", 4, 8), push)?;
//! ```
//!
//! # Modules
//!
//! - `workouts`: collection mutation API (main entry point)
//! - `models`: workout groups, exercises and image locators
//! - `storage`: SQLite key-value store and file helpers
//! - `assets`: image cache
//! - `sync`: sender, receiver and links
//! - `config`: application configuration

pub mod assets;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;
pub mod workouts;

pub use assets::{AssetCache, CacheStats};
pub use config::Config;
pub use models::{move_elements, Exercise, ExerciseDraft, Locator, WorkoutError, WorkoutGroup};
pub use storage::{LocalStore, StorageError};
pub use sync::{SyncReceiver, SyncSender};
pub use workouts::Workouts;
