use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Error, Result, Stage};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lines of tool output kept in error diagnostics
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Shared flag aborting every run observing it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
enum Arg {
    Flag(String),
    Path(PathBuf),
}

impl Arg {
    fn as_os(&self) -> &std::ffi::OsStr {
        match self {
            Arg::Flag(s) => s.as_ref(),
            Arg::Path(p) => p.as_os_str(),
        }
    }
}

/// One external tool invocation, run inside the scratch directory.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    stage: Stage,
    program: String,
    args: Vec<Arg>,
    cwd: PathBuf,
}

impl ToolCommand {
    /// `latex "<tex>"`
    pub fn latex(program: &str, extra: &[String], tex: &Path, cwd: &Path) -> Self {
        let mut cmd = Self::new(Stage::Latex, program, extra, cwd);
        cmd.args.push(Arg::Path(tex.to_path_buf()));
        cmd
    }

    /// `dvisvgm "<dvi>" -o "<svg>"`
    pub fn dvisvgm(program: &str, extra: &[String], dvi: &Path, svg: &Path, cwd: &Path) -> Self {
        let mut cmd = Self::new(Stage::Dvisvgm, program, extra, cwd);
        cmd.args.push(Arg::Path(dvi.to_path_buf()));
        cmd.args.push(Arg::Flag("-o".to_string()));
        cmd.args.push(Arg::Path(svg.to_path_buf()));
        cmd
    }

    fn new(stage: Stage, program: &str, extra: &[String], cwd: &Path) -> Self {
        ToolCommand {
            stage,
            program: program.to_string(),
            args: extra.iter().cloned().map(Arg::Flag).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Run to completion, failing on spawn error, non-zero exit, timeout or
    /// cancellation. A `None` timeout waits indefinitely.
    pub fn run(&self, timeout: Option<Duration>, cancel: &CancelToken) -> Result<()> {
        let command = self.to_string();
        log::debug!("running {command}");
        let mut child = Command::new(&self.program)
            .args(self.args.iter().map(Arg::as_os))
            .current_dir(&self.cwd)
            // an interactive TeX prompt reads EOF and gives up
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                stage: self.stage,
                command: command.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.wait(&mut child, timeout, cancel) {
            Ok(status) => status,
            Err(err) => {
                // grandchildren may still hold the pipes; leave the readers detached
                drop(stdout);
                drop(stderr);
                return Err(err);
            }
        };
        let output = Captured {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };
        if !status.success() {
            log::error!("{command} exited with {status}: {}", output.stderr.trim());
            return Err(Error::Tool {
                stage: self.stage,
                command,
                diagnostics: output.diagnostics(),
            });
        }
        log::trace!("{command}: {}", output.stdout.trim_end());
        Ok(())
    }

    fn wait(
        &self,
        child: &mut Child,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ExitStatus> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(source) => {
                    kill(child);
                    return Err(Error::Spawn {
                        stage: self.stage,
                        command: self.to_string(),
                        source,
                    });
                }
            }
            if cancel.is_cancelled() {
                kill(child);
                return Err(Error::Cancelled {
                    stage: self.stage,
                    command: self.to_string(),
                });
            }
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    kill(child);
                    return Err(Error::Timeout {
                        stage: self.stage,
                        command: self.to_string(),
                        timeout,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Flag(s) => write!(f, " {s}")?,
                Arg::Path(p) => write!(f, " \"{}\"", p.display())?,
            }
        }
        Ok(())
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("failed to kill child {}: {e}", child.id());
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    /// Tail of the combined output; TeX reports errors on stdout.
    fn diagnostics(&self) -> String {
        let combined = format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end());
        let lines: Vec<&str> = combined.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
        lines[start..].join("\n")
    }
}
