use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scratch::ScratchDir;

/// Path of a JSON settings file
pub const SETTINGS_ENV: &str = "TIKZ_PANDOC_SETTINGS";
/// Directory for scratch files and persisted SVG images
pub const TMPDIR_ENV: &str = "TIKZ_PANDOC_TMPDIR";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Renderer configuration, passed explicitly to [`crate::Compiler`].
///
/// Every field has a default, so a settings file only needs to name the
/// values it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// `latex` executable
    pub latex: String,
    /// Extra arguments placed before the `.tex` path
    pub latex_args: Vec<String>,
    /// `dvisvgm` executable
    pub dvisvgm: String,
    /// Extra arguments placed before the `.dvi` path
    pub dvisvgm_args: Vec<String>,
    /// Scratch directory; defaults to `obsidian-tikz-processor` under the OS temp dir
    pub scratch_dir: Option<PathBuf>,
    /// Where SVG files linked from non-HTML pandoc output are written
    pub image_dir: Option<PathBuf>,
    /// Inserted after the fixed package list
    pub extra_preamble: String,
    /// Leave every scratch file on disk after a run
    pub keep_artifacts: bool,
    /// Per-tool timeout; 0 waits forever
    pub timeout_secs: u64,
    /// Concurrent renders; 0 picks the available parallelism
    pub max_jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            latex: "latex".to_string(),
            latex_args: Vec::new(),
            dvisvgm: "dvisvgm".to_string(),
            dvisvgm_args: Vec::new(),
            scratch_dir: None,
            image_dir: None,
            extra_preamble: String::new(),
            keep_artifacts: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_jobs: 0,
        }
    }
}

impl Settings {
    /// Load `path`, merging its fields over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::SettingsFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("no settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source: std::io::Error| Error::SettingsIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut text = serde_json::to_string_pretty(self).map_err(|source| {
            Error::SettingsFormat {
                path: path.to_path_buf(),
                source,
            }
        })?;
        text.push('\n');
        fs::write(path, text).map_err(io_err)
    }

    /// Settings file named by `TIKZ_PANDOC_SETTINGS` (or defaults), with
    /// `TIKZ_PANDOC_TMPDIR` overriding the scratch and image directories.
    pub fn from_env() -> Result<Self> {
        Self::resolve(settings_path_from_env().as_deref())
    }

    /// Settings from `path` (or defaults), with `TIKZ_PANDOC_TMPDIR` applied.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_or_default(path)?,
            None => Self::default(),
        };
        if let Ok(dir) = env::var(TMPDIR_ENV) {
            settings.apply_tmpdir(PathBuf::from(dir));
        }
        Ok(settings)
    }

    pub fn apply_tmpdir(&mut self, dir: PathBuf) {
        self.scratch_dir = Some(dir.clone());
        self.image_dir = Some(dir);
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(ScratchDir::default_root)
    }

    pub fn image_root(&self) -> PathBuf {
        self.image_dir.clone().unwrap_or_else(env::temp_dir)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn jobs(&self) -> usize {
        if self.max_jobs > 0 {
            self.max_jobs
        } else {
            thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

pub fn settings_path_from_env() -> Option<PathBuf> {
    env::var_os(SETTINGS_ENV).map(PathBuf::from)
}
