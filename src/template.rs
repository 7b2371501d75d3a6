const PREAMBLE: &str = r"\documentclass{standalone}
\usepackage{amsmath,amsfonts}
\usepackage{tikz-cd}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
";

const BEGIN: &str = "\\begin{document}\n\\centering\n";

const END: &str = "\\end{document}";

/// Wrap raw tikz source in a complete standalone LaTeX document.
///
/// The source is trimmed and embedded verbatim; nothing is escaped or
/// validated, so malformed input only shows up as a `latex` failure.
pub fn wrap_document(source: &str, extra_preamble: &str) -> String {
    let source = source.trim();
    let extra = extra_preamble.trim();
    let mut doc = String::with_capacity(
        PREAMBLE.len() + extra.len() + BEGIN.len() + source.len() + END.len() + 2,
    );
    doc.push_str(PREAMBLE);
    if !extra.is_empty() {
        doc.push_str(extra);
        doc.push('\n');
    }
    doc.push_str(BEGIN);
    doc.push_str(source);
    doc.push('\n');
    doc.push_str(END);
    doc
}
