use crate::compile::Compiler;

/// Label prefixed to every inline error message
pub const ERROR_LABEL: &str = "编译失败";

pub enum TransformResult {
    Svg(String),
    Error(String),
}

impl TransformResult {
    pub fn into_html(self) -> String {
        match self {
            TransformResult::Svg(s) | TransformResult::Error(s) => s,
        }
    }
}

fn error_format(s: &str) -> String {
    format!(
        r#"<div style="color: red;">{ERROR_LABEL}: {}</div>"#,
        htmlize::escape_text(s).replace('\n', "<br/>")
    )
}

fn blank_line_remover(s: &str) -> String {
    // Need to avoid blank lines in the rendered SVG, as they can cause
    // markdown to resume 'normal' md processing, especially when e.g.
    // indentation can cause an implicit code block to be started.
    // See https://talk.commonmark.org/t/inline-html-breaks-when-using-indentation/3317
    // and https://spec.commonmark.org/0.31.2/#html-blocks
    s.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tikz_handler(compiler: &Compiler, s: &str) -> TransformResult {
    match compiler.compile(s) {
        Ok(svg) => TransformResult::Svg(blank_line_remover(&svg)),
        Err(e) => {
            log::warn!("tikz block failed: {e}");
            TransformResult::Error(error_format(&e.to_string()))
        }
    }
}

/// Element a rendered block is placed in.
pub fn render_target(inner: &str) -> String {
    format!(
        "<div class=\"tikz-output\" style=\"margin: 10px auto; display: block;\">\n{inner}\n</div>"
    )
}
