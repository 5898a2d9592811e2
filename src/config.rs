//! Destination roots and video categories.
//!
//! Configuration is layered. The first file found wins, then environment
//! variables and command-line flags override the roots it names:
//!
//! 1. an explicit `--config <path>`
//! 2. `.sortinghat.toml` in the current directory
//! 3. `~/.config/sorting-hat/config.toml`
//! 4. built-in defaults (no roots, the standard video categories)
//!
//! `VIDEO_PATH` and `OTHER_PATH` (read from the environment or a `.env`
//! file) override the roots from the file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [roots]
//! video = "/media/videos"
//! other = "/media/other"
//!
//! [[video_categories]]
//! label = "Live"
//! dir = "live"
//!
//! [[video_categories]]
//! label = "Animated"
//! dir = "animated"
//! ```

use crate::job::JobKind;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the video root.
pub const VIDEO_PATH_VAR: &str = "VIDEO_PATH";
/// Environment variable naming the root for everything else.
pub const OTHER_PATH_VAR: &str = "OTHER_PATH";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// IO error while reading configuration.
    #[error("could not read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A destination root was never supplied.
    #[error("could not find {0} in the environment or configuration")]
    MissingRoot(&'static str),
    /// A destination root does not exist.
    #[error("{key}: {} does not exist", path.display())]
    RootNotFound { key: &'static str, path: PathBuf },
    /// A destination root exists but is not a directory.
    #[error("{key}: {} is not a directory", path.display())]
    RootNotDirectory { key: &'static str, path: PathBuf },
    /// No video categories are configured.
    #[error("at least one video category is required")]
    NoCategories,
    /// A category directory is not a single plain path component.
    #[error("video category '{label}' has an invalid directory '{dir}'")]
    InvalidCategory { label: String, dir: String },
    /// The run was started without any paths to process.
    #[error("sorting-hat requires at least one file or directory argument")]
    NoArguments,
}

/// Unvalidated configuration as read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub roots: Roots,

    /// Subcategories offered for single-file (video) jobs, in menu order.
    #[serde(default = "default_video_categories")]
    pub video_categories: Vec<Subcategory>,
}

/// Destination roots, one per job kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roots {
    pub video: Option<PathBuf>,
    pub other: Option<PathBuf>,
}

/// A menu entry and the directory it maps to under the video root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subcategory {
    pub label: String,
    pub dir: String,
}

impl Subcategory {
    pub fn new(label: &str, dir: &str) -> Self {
        Self {
            label: label.to_string(),
            dir: dir.to_string(),
        }
    }
}

fn default_video_categories() -> Vec<Subcategory> {
    vec![
        Subcategory::new("Live", "live"),
        Subcategory::new("3D", "3d"),
        Subcategory::new("Animated", "animated"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: Roots::default(),
            video_categories: default_video_categories(),
        }
    }
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any file found is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".sortinghat.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sorting-hat")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Overrides roots from `VIDEO_PATH` / `OTHER_PATH` as returned by `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(video) = lookup(VIDEO_PATH_VAR).filter(|v| !v.is_empty()) {
            self.roots.video = Some(PathBuf::from(video));
        }
        if let Some(other) = lookup(OTHER_PATH_VAR).filter(|v| !v.is_empty()) {
            self.roots.other = Some(PathBuf::from(other));
        }
    }

    /// Overrides roots with explicitly supplied values.
    pub fn apply_overrides(&mut self, video: Option<&Path>, other: Option<&Path>) {
        if let Some(video) = video {
            self.roots.video = Some(video.to_path_buf());
        }
        if let Some(other) = other {
            self.roots.other = Some(other.to_path_buf());
        }
    }

    /// Checks both roots and the category list.
    ///
    /// # Errors
    ///
    /// Fails if a root is missing, does not exist, or is not a directory, or
    /// if the category list is empty or names a nested/relative directory.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let video_root = validate_root(VIDEO_PATH_VAR, self.roots.video)?;
        let other_root = validate_root(OTHER_PATH_VAR, self.roots.other)?;

        if self.video_categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        for category in &self.video_categories {
            let mut components = Path::new(&category.dir).components();
            let single_normal = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !single_normal {
                return Err(ConfigError::InvalidCategory {
                    label: category.label.clone(),
                    dir: category.dir.clone(),
                });
            }
        }

        Ok(ValidatedConfig {
            video_root,
            other_root,
            video_categories: self.video_categories,
        })
    }
}

fn validate_root(key: &'static str, path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let path = path.ok_or(ConfigError::MissingRoot(key))?;
    if !path.exists() {
        return Err(ConfigError::RootNotFound { key, path });
    }
    if !path.is_dir() {
        return Err(ConfigError::RootNotDirectory { key, path });
    }
    Ok(path)
}

/// Configuration whose roots are known to be existing directories.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    video_root: PathBuf,
    other_root: PathBuf,
    video_categories: Vec<Subcategory>,
}

impl ValidatedConfig {
    pub fn video_root(&self) -> &Path {
        &self.video_root
    }

    pub fn other_root(&self) -> &Path {
        &self.other_root
    }

    pub fn video_categories(&self) -> &[Subcategory] {
        &self.video_categories
    }

    /// The root a job of `kind` is relocated under.
    pub fn root_for(&self, kind: JobKind) -> &Path {
        match kind {
            JobKind::SingleFile => &self.video_root,
            JobKind::Composite => &self.other_root,
        }
    }
}
