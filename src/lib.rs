//! Render TikZ diagrams to inline SVG.
//!
//! Each diagram is wrapped in a fixed standalone LaTeX document, compiled
//! with `latex`, converted with `dvisvgm`, and the resulting SVG text is
//! handed back for embedding. The binary exposes this as a pandoc filter
//! for `tikz` codeblocks, a Markdown rewriter, and a single-diagram
//! compiler.
//!
//! ```no_run
//! use tikz_pandoc::{Compiler, Settings};
//!
//! let compiler = Compiler::new(Settings::default());
//! let svg = compiler.compile(r"\draw (0,0) -- (1,1);")?;
//! assert!(svg.contains("<svg"));
//! # Ok::<(), tikz_pandoc::Error>(())
//! ```

pub mod compile;
pub mod error;
pub mod markdown;
pub mod plugin;
pub mod pool;
pub mod scratch;
pub mod settings;
pub mod template;
pub mod toolchain;
pub mod transform;

pub use compile::Compiler;
pub use error::{Error, Result, Stage};
pub use settings::Settings;
pub use toolchain::CancelToken;
