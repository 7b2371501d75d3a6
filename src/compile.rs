//! The tikz to SVG pipeline.
//!
//! `templated -> directory-ready -> tex-written -> latex-compiled ->
//! svg-converted -> svg-read`, stopping at the first failure. Scratch files
//! are removed when the run ends, whichever way it ends, unless the
//! settings ask to keep them.

use std::fs;

use crate::error::{Error, Result};
use crate::scratch::ScratchDir;
use crate::settings::Settings;
use crate::template::wrap_document;
use crate::toolchain::{CancelToken, ToolCommand};

#[derive(Clone, Debug, Default)]
pub struct Compiler {
    settings: Settings,
    cancel: CancelToken,
}

impl Compiler {
    pub fn new(settings: Settings) -> Self {
        Self::with_cancel(settings, CancelToken::new())
    }

    /// Runs of this compiler abort once `cancel` fires.
    pub fn with_cancel(settings: Settings, cancel: CancelToken) -> Self {
        Compiler { settings, cancel }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Compile raw tikz source to SVG markup.
    ///
    /// The returned text is the file `dvisvgm` wrote, untouched. Callers
    /// embedding it into HTML inherit whatever it contains: it is not
    /// sanitized.
    pub fn compile(&self, source: &str) -> Result<String> {
        let settings = &self.settings;
        let document = wrap_document(source, &settings.extra_preamble);

        let scratch = ScratchDir::ensure(settings.scratch_root())?;
        let files = scratch.stage(&document, settings.keep_artifacts)?;
        log::debug!("staged {}", files.tex.display());

        ToolCommand::latex(
            &settings.latex,
            &settings.latex_args,
            &files.tex,
            scratch.path(),
        )
        .run(settings.timeout(), &self.cancel)?;

        ToolCommand::dvisvgm(
            &settings.dvisvgm,
            &settings.dvisvgm_args,
            &files.dvi,
            &files.svg,
            scratch.path(),
        )
        .run(settings.timeout(), &self.cancel)?;

        let svg = fs::read_to_string(&files.svg).map_err(|source| Error::ReadSvg {
            path: files.svg.clone(),
            source,
        })?;
        if svg.contains("<script") {
            log::warn!("{} contains a <script> element", files.svg.display());
        }
        log::info!("rendered {} ({} bytes)", files.base_name(), svg.len());
        Ok(svg)
    }
}
