use crate::core::decision::{KeepRule, ReviewMode};
use crate::core::disposal::DisposalMode;
use crate::core::fingerprint::{Fingerprint, HashKind};
use crate::core::scanner::DEFAULT_EXTENSIONS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_THRESHOLD: u32 = 10;
pub const DEFAULT_LOG_NAME: &str = "simcull-log.jsonl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Threshold {threshold} is out of range (0..={max})", max = Fingerprint::BITS)]
    ThresholdOutOfRange { threshold: u32 },

    #[error("--keep-larger and --keep-smaller are mutually exclusive")]
    ConflictingKeepRules,

    #[error("A keep rule only applies in automatic mode; drop it or drop --interactive")]
    KeepRuleInInteractiveMode,

    #[error("jobs must be at least 1")]
    NoJobs,

    #[error("At least one image extension is required")]
    NoExtensions,

    #[error("Directory does not exist: {path}")]
    MissingRoot { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Trash folder {path} exists and is not a directory")]
    TrashNotADirectory { path: PathBuf },

    #[error("Trash folder can't be the scanned directory itself: {path}")]
    TrashIsRoot { path: PathBuf },

    #[error("Could not read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One layer of partial settings. Layers are merged from the config file and
/// the command line; unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub threshold: Option<u32>,
    pub interactive: Option<bool>,
    pub auto_keep_rule: Option<KeepRule>,
    pub trash_folder: Option<PathBuf>,
    pub hash_kind: Option<HashKind>,
    pub dry_run: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub extensions: Option<Vec<String>>,
}

impl Settings {
    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            threshold: other.threshold.or(self.threshold),
            interactive: other.interactive.or(self.interactive),
            auto_keep_rule: other.auto_keep_rule.or(self.auto_keep_rule),
            trash_folder: other.trash_folder.or(self.trash_folder),
            hash_kind: other.hash_kind.or(self.hash_kind),
            dry_run: other.dry_run.or(self.dry_run),
            log_file: other.log_file.or(self.log_file),
            jobs: other.jobs.or(self.jobs),
            extensions: other.extensions.or(self.extensions),
        }
    }

    pub fn from_file(path: &Path) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings from `explicit`, else from the per-user config file if one exists.
    pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    log::debug!("Using config file {}", path.display());
                    Self::from_file(&path)
                }
                _ => Ok(Settings::default()),
            },
        }
    }

    /// Translate the two keep-rule flags, rejecting both at once.
    pub fn keep_rule_from_flags(
        keep_larger: bool,
        keep_smaller: bool,
    ) -> Result<Option<KeepRule>, ConfigError> {
        match (keep_larger, keep_smaller) {
            (true, true) => Err(ConfigError::ConflictingKeepRules),
            (true, false) => Ok(Some(KeepRule::KeepLarger)),
            (false, true) => Ok(Some(KeepRule::KeepSmaller)),
            (false, false) => Ok(None),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("simcull").join("config.json"))
}

/// Fully validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub root: PathBuf,
    pub threshold: u32,
    pub hash_kind: HashKind,
    pub review: ReviewMode,
    pub disposal: DisposalMode,
    pub dry_run: bool,
    pub log_file: PathBuf,
    pub jobs: usize,
    pub extensions: Vec<String>,
}

impl Config {
    pub fn resolve(root: impl Into<PathBuf>, settings: Settings) -> Result<Config, ConfigError> {
        Self::build(root.into(), settings, true)
    }

    /// Like `resolve`, for runs that never remove anything. Review and
    /// disposal options are not validated; an unusable trash folder is
    /// dropped instead of rejected.
    pub fn resolve_for_scan(
        root: impl Into<PathBuf>,
        settings: Settings,
    ) -> Result<Config, ConfigError> {
        Self::build(root.into(), settings, false)
    }

    fn build(root: PathBuf, settings: Settings, removing: bool) -> Result<Config, ConfigError> {
        if !root.exists() {
            return Err(ConfigError::MissingRoot { path: root });
        }
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory { path: root });
        }

        let threshold = settings.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if threshold > Fingerprint::BITS {
            return Err(ConfigError::ThresholdOutOfRange { threshold });
        }

        let (review, disposal) = if removing {
            (
                review_mode(settings.interactive, settings.auto_keep_rule)?,
                disposal_mode(settings.trash_folder, &root)?,
            )
        } else {
            let disposal = disposal_mode(settings.trash_folder, &root).unwrap_or_else(|e| {
                log::debug!("Ignoring trash folder for scan: {}", e);
                DisposalMode::Permanent
            });
            (ReviewMode::default(), disposal)
        };

        let jobs = settings.jobs.unwrap_or(1);
        if jobs == 0 {
            return Err(ConfigError::NoJobs);
        }

        let extensions = settings
            .extensions
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect());
        if extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        let log_file = settings
            .log_file
            .unwrap_or_else(|| root.join(DEFAULT_LOG_NAME));

        Ok(Config {
            root,
            threshold,
            hash_kind: settings.hash_kind.unwrap_or_default(),
            review,
            disposal,
            dry_run: removing && settings.dry_run.unwrap_or(false),
            log_file,
            jobs,
            extensions,
        })
    }

    pub fn trash_folder(&self) -> Option<&Path> {
        match &self.disposal {
            DisposalMode::Trash(dir) => Some(dir),
            DisposalMode::Permanent => None,
        }
    }

    pub fn describe_review(&self) -> String {
        match self.review {
            ReviewMode::Interactive => "interactive".to_string(),
            ReviewMode::Automatic(KeepRule::KeepLarger) => "automatic (keep larger)".to_string(),
            ReviewMode::Automatic(KeepRule::KeepSmaller) => "automatic (keep smaller)".to_string(),
        }
    }

    pub fn describe_disposal(&self) -> String {
        match &self.disposal {
            DisposalMode::Permanent => "permanent delete".to_string(),
            DisposalMode::Trash(dir) => format!("trash to {}", dir.display()),
        }
    }
}

fn review_mode(
    interactive: Option<bool>,
    rule: Option<KeepRule>,
) -> Result<ReviewMode, ConfigError> {
    match (interactive.unwrap_or(false), rule) {
        (true, Some(_)) => Err(ConfigError::KeepRuleInInteractiveMode),
        (true, None) => Ok(ReviewMode::Interactive),
        (false, rule) => Ok(ReviewMode::Automatic(rule.unwrap_or_default())),
    }
}

fn disposal_mode(trash: Option<PathBuf>, root: &Path) -> Result<DisposalMode, ConfigError> {
    let Some(trash) = trash else {
        return Ok(DisposalMode::Permanent);
    };
    if trash.exists() && !trash.is_dir() {
        return Err(ConfigError::TrashNotADirectory { path: trash });
    }
    if same_location(&trash, root) {
        return Err(ConfigError::TrashIsRoot { path: trash });
    }
    Ok(DisposalMode::Trash(trash))
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
