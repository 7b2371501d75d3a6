//! Rewriting of fenced `tikz` blocks in Markdown text.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::compile::Compiler;
use crate::pool::RenderPool;
use crate::transform::{render_target, tikz_handler};

/// A fenced code block found in the source text
#[derive(Debug, PartialEq, Eq)]
pub struct FencedBlock {
    /// Byte range of the whole block, fences included
    pub range: Range<usize>,
    pub content: String,
}

/// Fenced code blocks whose info string starts with `lang`, in order.
pub fn find_fenced_blocks(text: &str, lang: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<FencedBlock> = None;
    for (event, range) in Parser::new_ext(text, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if info.split_whitespace().next() == Some(lang) =>
            {
                current = Some(FencedBlock {
                    range,
                    content: String::new(),
                });
            }
            Event::Text(t) => {
                if let Some(block) = current.as_mut() {
                    block.content.push_str(&t);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

/// Replace each block's range with the matching replacement.
pub fn splice(text: &str, blocks: &[FencedBlock], replacements: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for (block, replacement) in blocks.iter().zip(replacements) {
        out.push_str(&text[pos..block.range.start]);
        out.push_str(replacement);
        if text[block.range.clone()].ends_with('\n') {
            out.push('\n');
        }
        pos = block.range.end;
    }
    out.push_str(&text[pos..]);
    out
}

pub struct MarkdownRewriter {
    compiler: Compiler,
    pool: RenderPool,
}

impl MarkdownRewriter {
    pub fn new(compiler: Compiler) -> Self {
        let pool = RenderPool::new(compiler.settings().jobs());
        MarkdownRewriter { compiler, pool }
    }

    /// Render every `tikz` block of `text` in place; everything else is
    /// copied through unchanged.
    pub fn rewrite(&self, text: &str) -> String {
        let blocks = find_fenced_blocks(text, "tikz");
        if blocks.is_empty() {
            return text.to_string();
        }
        log::info!("rendering {} tikz block(s)", blocks.len());
        let sources: Vec<&str> = blocks.iter().map(|b| b.content.as_str()).collect();
        let rendered = self.pool.run(sources, |source| {
            render_target(&tikz_handler(&self.compiler, source).into_html())
        });
        splice(text, &blocks, &rendered)
    }
}
