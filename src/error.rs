use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// External tool invoked by the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Latex,
    Dvisvgm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Latex => write!(f, "latex"),
            Stage::Dvisvgm => write!(f, "dvisvgm"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot create scratch directory {}: {source}", path.display())]
    ScratchDir { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", path.display())]
    WriteTex { path: PathBuf, source: io::Error },

    #[error("{stage} failed: {command}\n{diagnostics}")]
    Tool {
        stage: Stage,
        command: String,
        diagnostics: String,
    },

    #[error("{stage} failed: {command} could not be started ({source}); check that the TeX toolchain is installed")]
    Spawn {
        stage: Stage,
        command: String,
        source: io::Error,
    },

    #[error("{stage} timed out after {}s: {command}", timeout.as_secs())]
    Timeout {
        stage: Stage,
        command: String,
        timeout: Duration,
    },

    #[error("{stage} cancelled: {command}")]
    Cancelled { stage: Stage, command: String },

    #[error("cannot read {}: {source}", path.display())]
    ReadSvg { path: PathBuf, source: io::Error },

    #[error("cannot access settings file {}: {source}", path.display())]
    SettingsIo { path: PathBuf, source: io::Error },

    #[error("invalid settings file {}: {source}", path.display())]
    SettingsFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Error {
    /// Command line of the external tool involved, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Tool { command, .. }
            | Error::Spawn { command, .. }
            | Error::Timeout { command, .. }
            | Error::Cancelled { command, .. } => Some(command),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Tool { stage, .. }
            | Error::Spawn { stage, .. }
            | Error::Timeout { stage, .. }
            | Error::Cancelled { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
