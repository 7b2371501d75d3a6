use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use serde_json::{Value, from_reader, to_writer};

use tikz_pandoc::markdown::MarkdownRewriter;
use tikz_pandoc::plugin::{EmbedType, PandocPlugin, TikzPlugin};
use tikz_pandoc::settings::{SETTINGS_ENV, Settings, settings_path_from_env};
use tikz_pandoc::transform::ERROR_LABEL;
use tikz_pandoc::Compiler;

#[derive(Debug, Default, PartialEq)]
enum Mode {
    /// pandoc JSON filter; carries the target format pandoc passes
    #[default]
    Filter,
    Compile,
    Rewrite,
    ShowSettings,
}

#[derive(Debug, Default)]
struct Args {
    mode: Mode,
    format: Option<String>,
    input: Option<String>,
    out: Option<PathBuf>,
    settings: Option<PathBuf>,
    jobs: Option<usize>,
    timeout: Option<u64>,
    keep: bool,
    save: bool,
}

fn usage() -> &'static str {
    "tikz-pandoc\n\
\n\
USAGE:\n\
  tikz-pandoc [<format>]                       pandoc filter (JSON AST on stdin/stdout)\n\
  tikz-pandoc compile [<path>|-] [--out <path>]  compile one diagram to SVG\n\
  tikz-pandoc rewrite [<path>|-] [--out <path>]  render tikz blocks in Markdown\n\
  tikz-pandoc settings [--save]                print (or persist) effective settings\n\
\n\
OPTIONS:\n\
  --settings <path>   JSON settings file (default: $TIKZ_PANDOC_SETTINGS)\n\
  --jobs <n>          concurrent renders\n\
  --timeout <secs>    per-tool timeout, 0 disables\n\
  --keep              keep scratch files\n\
\n\
ENVIRONMENT:\n\
  TIKZ_PANDOC_TMPDIR  scratch and image directory\n\
  RUST_LOG            log filter (logs go to stderr)\n"
}

fn parse_args(argv: &[String]) -> anyhow::Result<Option<Args>> {
    let mut args = Args::default();
    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Ok(None),
            "compile" if args.mode == Mode::Filter && args.format.is_none() => {
                args.mode = Mode::Compile
            }
            "rewrite" if args.mode == Mode::Filter && args.format.is_none() => {
                args.mode = Mode::Rewrite
            }
            "settings" if args.mode == Mode::Filter && args.format.is_none() => {
                args.mode = Mode::ShowSettings
            }
            "--save" => args.save = true,
            "--keep" => args.keep = true,
            "--out" | "-o" => args.out = Some(PathBuf::from(value(&mut it, a)?)),
            "--settings" => args.settings = Some(PathBuf::from(value(&mut it, a)?)),
            "--jobs" | "-j" => {
                args.jobs = Some(
                    value(&mut it, a)?
                        .parse()
                        .with_context(|| format!("invalid value for {a}"))?,
                )
            }
            "--timeout" => {
                args.timeout = Some(
                    value(&mut it, a)?
                        .parse()
                        .with_context(|| format!("invalid value for {a}"))?,
                )
            }
            s if s.starts_with("--") => bail!("unknown option {s}\n\n{}", usage()),
            s => match args.mode {
                Mode::Filter if args.format.is_none() => args.format = Some(s.to_string()),
                Mode::Compile | Mode::Rewrite if args.input.is_none() => {
                    args.input = Some(s.to_string())
                }
                _ => bail!("unexpected argument {s}\n\n{}", usage()),
            },
        }
    }
    Ok(Some(args))
}

fn value<'a>(it: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<&'a str> {
    it.next()
        .map(String::as_str)
        .with_context(|| format!("{flag} expects a value"))
}

fn settings_path(args: &Args) -> Option<PathBuf> {
    args.settings.clone().or_else(settings_path_from_env)
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::resolve(Some(path))?,
        None => Settings::from_env()?,
    };
    if let Some(jobs) = args.jobs {
        settings.max_jobs = jobs;
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    if args.keep {
        settings.keep_artifacts = true;
    }
    Ok(settings)
}

fn read_input(input: Option<&str>) -> anyhow::Result<String> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {path}")),
    }
}

fn write_output(out: Option<&PathBuf>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let settings = load_settings(&args)?;
    match args.mode {
        Mode::Filter => {
            let embed = args.format.as_deref().map_or(EmbedType::Inline, EmbedType::from);
            log::debug!("pandoc filter, format {:?}, embedding {embed:?}", args.format);
            let plugin = TikzPlugin::new(embed, Compiler::new(settings));

            let mut input: Value =
                from_reader(io::stdin().lock()).context("Failed to read JSON from stdin")?;
            plugin.process_doc(&mut input);
            let mut output = io::stdout().lock();
            to_writer(&mut output, &input).context("Failed to write JSON to stdout")?;
            output.flush()?;
        }
        Mode::Compile => {
            let source = read_input(args.input.as_deref())?;
            let svg = Compiler::new(settings)
                .compile(&source)
                .context(ERROR_LABEL)?;
            write_output(args.out.as_ref(), &svg)?;
        }
        Mode::Rewrite => {
            let text = read_input(args.input.as_deref())?;
            let rewritten = MarkdownRewriter::new(Compiler::new(settings)).rewrite(&text);
            write_output(args.out.as_ref(), &rewritten)?;
        }
        Mode::ShowSettings => {
            if args.save {
                let Some(path) = settings_path(&args) else {
                    bail!("--save needs --settings <path> or ${}", SETTINGS_ENV);
                };
                settings.save(&path)?;
                log::info!("saved settings to {}", path.display());
            } else {
                let mut text = serde_json::to_string_pretty(&settings)?;
                text.push('\n');
                write_output(None, &text)?;
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Keep logging setup in the binary so the library remains unopinionated.
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{}", usage());
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
