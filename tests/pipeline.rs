//! End-to-end runs of the compile pipeline against a fake TeX toolchain.

#![cfg(unix)]

mod common;

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use common::{FakeToolchain, SVG_HEADER, leftovers};
use tikz_pandoc::transform::{ERROR_LABEL, TransformResult, tikz_handler};
use tikz_pandoc::{CancelToken, Compiler, Error, Settings, Stage};

const DIAGRAM: &str = r"\node (A) {A}; \node (B) [right of=A] {B}; \draw (A) -- (B);";

#[test]
fn compiles_to_svg_and_cleans_up() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(tools.settings(scratch.path()));

    let svg = compiler.compile(&format!("\n{DIAGRAM}\n")).unwrap();
    assert!(svg.starts_with(SVG_HEADER), "{svg}");
    assert!(svg.contains("<svg"));
    assert!(svg.contains(DIAGRAM), "source reaches the toolchain verbatim");
    assert_eq!(tools.calls(), ["latex", "dvisvgm"]);
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn kept_tex_file_holds_wrapped_source() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(Settings {
        keep_artifacts: true,
        ..tools.settings(scratch.path())
    });

    compiler.compile(DIAGRAM).unwrap();
    let files = leftovers(scratch.path());
    let tex: Vec<_> = files.iter().filter(|f| f.ends_with(".tex")).collect();
    assert_eq!(tex.len(), 1);
    assert!(tex[0].starts_with("tikz_graph_"));
    let base = tex[0].trim_end_matches(".tex");
    for ext in ["dvi", "svg"] {
        assert!(files.contains(&format!("{base}.{ext}")), "{files:?}");
    }

    let doc = fs::read_to_string(scratch.path().join(tex[0])).unwrap();
    assert!(doc.starts_with("\\documentclass{standalone}\n"));
    assert!(doc.contains(&format!("\\begin{{document}}\n\\centering\n{DIAGRAM}\n\\end{{document}}")));
    assert!(doc.ends_with("\\end{document}"));
}

#[test]
fn scratch_directory_is_created() {
    let tools = FakeToolchain::new();
    let root = tempfile::tempdir().unwrap();
    let scratch = root.path().join("a").join("b");
    let compiler = Compiler::new(tools.settings(&scratch));
    compiler.compile(DIAGRAM).unwrap();
    compiler.compile(DIAGRAM).unwrap();
    assert!(scratch.is_dir());
}

#[test]
fn relative_scratch_directory_works() {
    let tools = FakeToolchain::new();
    let work = tempfile::Builder::new()
        .prefix("tikz-relative-")
        .tempdir_in(".")
        .unwrap();
    let scratch = work.path().join("build").join("tikz");
    assert!(scratch.is_relative());
    let compiler = Compiler::new(tools.settings(&scratch));

    let svg = compiler.compile(DIAGRAM).unwrap();
    assert!(svg.contains(DIAGRAM));
    assert_eq!(tools.calls(), ["latex", "dvisvgm"]);
    assert!(leftovers(&scratch).is_empty());
    assert!(!scratch.join("build").exists());
}

#[test]
fn latex_failure_skips_dvisvgm() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(tools.failing_latex(scratch.path()));

    let err = compiler.compile(DIAGRAM).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Latex));
    let command = err.command().unwrap().to_string();
    assert!(command.contains("fail.sh"));
    assert!(command.ends_with(".tex\""));
    assert!(err.to_string().contains(&command));
    assert!(err.to_string().contains("Undefined control sequence"));
    assert_eq!(tools.calls(), ["fail"]);
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn dvisvgm_failure_keeps_dvi_when_asked() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(Settings {
        keep_artifacts: true,
        ..tools.failing_dvisvgm(scratch.path())
    });

    let err = compiler.compile(DIAGRAM).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Dvisvgm));
    let command = err.command().unwrap();
    assert!(command.contains(".dvi\" -o \""));
    assert!(command.ends_with(".svg\""));
    assert_eq!(tools.calls(), ["latex", "fail"]);
    let files = leftovers(scratch.path());
    assert!(files.iter().any(|f| f.ends_with(".dvi")), "{files:?}");
    assert!(!files.iter().any(|f| f.ends_with(".svg")));
}

#[test]
fn dvisvgm_failure_removes_files_by_default() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(tools.failing_dvisvgm(scratch.path()));
    assert!(compiler.compile(DIAGRAM).is_err());
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn missing_latex_reports_command() {
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(Settings {
        latex: "tikz-pandoc-no-such-latex".to_string(),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..Settings::default()
    });
    let err = compiler.compile(DIAGRAM).unwrap_err();
    assert!(matches!(err, Error::Spawn { stage: Stage::Latex, .. }));

    let TransformResult::Error(html) = tikz_handler(&compiler, DIAGRAM) else {
        panic!("expected an error block");
    };
    assert!(html.contains(ERROR_LABEL));
    assert!(html.contains("tikz-pandoc-no-such-latex"));
}

#[test]
fn hung_tool_times_out() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(tools.hanging_latex(scratch.path()));
    let started = Instant::now();
    let err = compiler.compile(DIAGRAM).unwrap_err();
    assert!(matches!(err, Error::Timeout { stage: Stage::Latex, .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn cancellation_aborts_run() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let cancel = CancelToken::new();
    let settings = Settings {
        timeout_secs: 0,
        ..tools.hanging_latex(scratch.path())
    };
    let compiler = Compiler::with_cancel(settings, cancel.clone());

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        cancel.cancel();
    });
    let err = compiler.compile(DIAGRAM).unwrap_err();
    trigger.join().unwrap();
    assert!(matches!(err, Error::Cancelled { .. }), "{err}");
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn concurrent_runs_do_not_collide() {
    let tools = FakeToolchain::new();
    let scratch = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(tools.settings(scratch.path()));

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let compiler = &compiler;
                s.spawn(move || compiler.compile(&format!("\\node {{N{i}}};")))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for (i, svg) in results.into_iter().enumerate() {
        let svg = svg.unwrap();
        assert!(svg.contains(&format!("\\node {{N{i}}};")), "run {i} got {svg}");
    }
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
#[ignore = "needs latex and dvisvgm on PATH"]
fn real_toolchain_renders_svg() {
    let compiler = Compiler::new(Settings::default());
    let svg = compiler
        .compile(&format!("\\begin{{tikzpicture}}{DIAGRAM}\\end{{tikzpicture}}"))
        .unwrap();
    assert!(svg.starts_with("<?xml"));
    assert!(svg.contains("<svg"));
}
