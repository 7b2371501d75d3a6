//! Scratch space for one pipeline run.
//!
//! Every run shares one scratch directory and owns a set of files named
//! from a single base name (`tikz_graph_{millis}_{token}`). Base names are
//! unique in practice but not guaranteed: the `.tex` file is created with
//! create-new semantics and a clash simply draws another name.

use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const SCRATCH_SUBDIR: &str = "obsidian-tikz-processor";

/// Extensions removed along with a run's files; `latex` drops `.aux` and
/// `.log` next to the `.dvi`.
const ARTIFACT_EXTENSIONS: [&str; 5] = ["tex", "dvi", "svg", "aux", "log"];

const STAGE_ATTEMPTS: usize = 8;

const TOKEN_LEN: usize = 11;

#[derive(Clone, Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn default_root() -> PathBuf {
        env::temp_dir().join(SCRATCH_SUBDIR)
    }

    /// Make sure `path` exists as a directory.
    ///
    /// An existing directory is fine; any other failure is returned. The
    /// stored path is absolute, since tools run with it as their working
    /// directory and also receive file paths inside it.
    pub fn ensure(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match fs::create_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(source) => return Err(Error::ScratchDir { path, source }),
        }
        match std::path::absolute(&path) {
            Ok(path) => Ok(ScratchDir { path }),
            Err(source) => Err(Error::ScratchDir { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `document` to a fresh `{base}.tex` and hand back the guard
    /// owning every file derived from that base name.
    pub fn stage(&self, document: &str, keep: bool) -> Result<ScratchFiles> {
        self.stage_with(document, keep, base_name)
    }

    fn stage_with(
        &self,
        document: &str,
        keep: bool,
        mut next_name: impl FnMut() -> String,
    ) -> Result<ScratchFiles> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let files = ScratchFiles::new(&self.path, next_name(), keep);
            let created = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&files.tex);
            let mut file = match created {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < STAGE_ATTEMPTS => {
                    log::debug!("base name {} already taken, retrying", files.base);
                    // nothing of ours is on disk yet
                    files.disarm();
                    continue;
                }
                Err(source) => {
                    let path = files.tex.clone();
                    files.disarm();
                    return Err(Error::WriteTex { path, source });
                }
            };
            if let Err(source) = file.write_all(document.as_bytes()) {
                return Err(Error::WriteTex {
                    path: files.tex.clone(),
                    source,
                });
            }
            return Ok(files);
        }
    }
}

/// Base filename shared by all files of one run.
pub fn base_name() -> String {
    format!("tikz_graph_{}_{}", Utc::now().timestamp_millis(), random_token())
}

fn random_token() -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = Uuid::new_v4().as_u128();
    let mut token = String::with_capacity(TOKEN_LEN);
    for _ in 0..TOKEN_LEN {
        token.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    token
}

/// Files of a single run; removed on drop unless kept.
#[derive(Debug)]
pub struct ScratchFiles {
    dir: PathBuf,
    base: String,
    pub tex: PathBuf,
    pub dvi: PathBuf,
    pub svg: PathBuf,
    keep: bool,
}

impl ScratchFiles {
    fn new(dir: &Path, base: String, keep: bool) -> Self {
        ScratchFiles {
            dir: dir.to_path_buf(),
            tex: dir.join(format!("{base}.tex")),
            dvi: dir.join(format!("{base}.dvi")),
            svg: dir.join(format!("{base}.svg")),
            base,
            keep,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn disarm(mut self) {
        self.keep = true;
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for ext in ARTIFACT_EXTENSIONS {
            let path = self.dir.join(format!("{}.{ext}", self.base));
            match fs::remove_file(&path) {
                Ok(()) => log::trace!("removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("could not remove {}: {e}", path.display()),
            }
        }
    }
}
