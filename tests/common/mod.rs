//! Stand-in TeX toolchain for tests.
//!
//! The fake tools are shell scripts run through `sh`, so nothing needs to be
//! made executable. Fake `latex` copies `<base>.tex` to `<base>.dvi`; fake
//! `dvisvgm` writes a small SVG embedding the `.dvi` text to its `-o` path.
//! Each tool appends its name to `calls.log` in the toolchain directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tikz_pandoc::Settings;

pub const SVG_HEADER: &str = "<?xml version='1.0' encoding='UTF-8'?>";

pub struct FakeToolchain {
    dir: TempDir,
}

impl FakeToolchain {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = FakeToolchain { dir };
        let log = tools.calls_path();
        tools.script(
            "latex.sh",
            &format!(
                "echo latex >> '{log}'\n\
                 tex=\"$1\"\n\
                 cp \"$tex\" \"${{tex%.tex}}.dvi\"\n\
                 echo \"This is fake TeX, output written on ${{tex%.tex}}.dvi\"\n",
                log = log.display()
            ),
        );
        tools.script(
            "dvisvgm.sh",
            &format!(
                "echo dvisvgm >> '{log}'\n\
                 dvi=\"$1\"\n\
                 out=\"$3\"\n\
                 {{\n\
                 echo \"{SVG_HEADER}\"\n\
                 echo\n\
                 echo '<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10pt\" height=\"10pt\">'\n\
                 echo '<desc>'\n\
                 grep -F -e '\\draw' -e '\\node' \"$dvi\" || true\n\
                 echo '</desc>'\n\
                 echo '</svg>'\n\
                 }} > \"$out\"\n",
                log = log.display()
            ),
        );
        tools.script(
            "fail.sh",
            &format!(
                "echo fail >> '{log}'\n\
                 echo '! Undefined control sequence.'\n\
                 printf '%s\\n' 'l.8 \\broken' >&2\n\
                 exit 1\n",
                log = log.display()
            ),
        );
        tools.script("hang.sh", "sleep 30\n");
        tools
    }

    fn script(&self, name: &str, body: &str) {
        fs::write(self.dir.path().join(name), format!("#!/bin/sh\nset -e\n{body}"))
            .expect("write script");
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn calls_path(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    /// Tool names in invocation order
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.calls_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn args(&self, script: &str) -> Vec<String> {
        vec![self.dir.path().join(script).display().to_string()]
    }

    /// Settings running the working fake tools in `scratch`
    pub fn settings(&self, scratch: &Path) -> Settings {
        Settings {
            latex: "sh".to_string(),
            latex_args: self.args("latex.sh"),
            dvisvgm: "sh".to_string(),
            dvisvgm_args: self.args("dvisvgm.sh"),
            scratch_dir: Some(scratch.to_path_buf()),
            image_dir: Some(scratch.to_path_buf()),
            timeout_secs: 20,
            max_jobs: 4,
            ..Settings::default()
        }
    }

    pub fn failing_latex(&self, scratch: &Path) -> Settings {
        Settings {
            latex_args: self.args("fail.sh"),
            ..self.settings(scratch)
        }
    }

    pub fn failing_dvisvgm(&self, scratch: &Path) -> Settings {
        Settings {
            dvisvgm_args: self.args("fail.sh"),
            ..self.settings(scratch)
        }
    }

    pub fn hanging_latex(&self, scratch: &Path) -> Settings {
        Settings {
            latex_args: self.args("hang.sh"),
            timeout_secs: 1,
            ..self.settings(scratch)
        }
    }
}

/// Names of the files left in `dir`
pub fn leftovers(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
