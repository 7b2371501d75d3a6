use crate::compile::Compiler;
use crate::pool::RenderPool;
use crate::transform::{TransformResult, render_target, tikz_handler};

use serde_json::{Map, Value};

use std::io::Write;
use std::path::PathBuf;
use tempfile::Builder;

/// How generated SVG should be embedded in the output doc
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedType {
    // inline SVG within the doc
    Inline,
    // image link to temp SVG file
    SvgFile,
}

impl From<&str> for EmbedType {
    fn from(s: &str) -> Self {
        match s {
            "markdown" | "html" | "html5" | "epub" | "epub3" => EmbedType::Inline,
            _ => EmbedType::SvgFile,
        }
    }
}

/// Represents a block of content to be inserted into the document
#[derive(Debug)]
pub enum BlockType {
    // raw HTML to be inserted as-is
    RawHtml(String),
    // link containing path to image file
    Image(PathBuf),
}

pub trait PandocPlugin {
    /// Called on each AST object; should return content of object if selected
    fn select_object(&self, object: &Map<String, Value>) -> Option<String>;

    /// Render the contents of every selected object, in order
    fn generate_blocks(&self, contents: Vec<String>) -> Vec<BlockType>;

    /// Replace the selected object with the generated block
    fn process_object(&self, object: &mut Map<String, Value>, block: BlockType) {
        let replacement = match block {
            BlockType::RawHtml(s) => serde_json::json!({
                "t": "RawBlock",
                "c": ["html", s]
            }),
            BlockType::Image(imgfile) => serde_json::json!({
                "t": "Para",
                "c": [{
                    "t": "Image",
                    "c": [
                        ["", [], []], [], [imgfile, ""]
                    ]
                }]
            }),
        };
        if let Value::Object(map) = replacement {
            *object = map;
        }
    }

    /// Process code blocks in the AST, replacing selected fenced code blocks
    /// with either raw HTML (e.g. inline SVG) or image blocks as appropriate.
    fn process_doc(&self, value: &mut Value) {
        let mut selected = Vec::new();
        collect_selected(self, value, &mut selected);
        if selected.is_empty() {
            return;
        }
        let (objects, contents): (Vec<_>, Vec<_>) = selected.into_iter().unzip();
        let blocks = self.generate_blocks(contents);
        for (object, block) in objects.into_iter().zip(blocks) {
            self.process_object(object, block);
        }
    }
}

fn collect_selected<'a, P: PandocPlugin + ?Sized>(
    plugin: &P,
    value: &'a mut Value,
    out: &mut Vec<(&'a mut Map<String, Value>, String)>,
) {
    match value {
        Value::Array(array) => {
            for item in array.iter_mut() {
                collect_selected(plugin, item, out);
            }
        }
        Value::Object(object) => {
            if let Some(content) = plugin.select_object(object) {
                out.push((object, content));
            } else {
                for value in object.values_mut() {
                    collect_selected(plugin, value, out);
                }
            }
        }
        _ => {}
    }
}

/// Content of a `CodeBlock` whose first class is `class`
pub fn codeblock_content(object: &Map<String, Value>, class: &str) -> Option<String> {
    if object.get("t").and_then(Value::as_str) == Some("CodeBlock") {
        if let Some(Value::Array(inner)) = object.get("c") {
            if let [Value::Array(meta), Value::String(content)] = &inner[..] {
                if let [_, Value::Array(classes), _] = &meta[..] {
                    if classes.first().and_then(Value::as_str) == Some(class) {
                        return Some(content.clone());
                    }
                }
            }
        }
    }
    None
}

pub struct TikzPlugin {
    embed: EmbedType,
    compiler: Compiler,
    pool: RenderPool,
}

impl TikzPlugin {
    pub fn new(embed: EmbedType, compiler: Compiler) -> Self {
        let pool = RenderPool::new(compiler.settings().jobs());
        TikzPlugin {
            embed,
            compiler,
            pool,
        }
    }

    fn generate_block(&self, content: &str) -> BlockType {
        match tikz_handler(&self.compiler, content) {
            TransformResult::Error(e) => BlockType::RawHtml(e),
            TransformResult::Svg(s) => match self.embed {
                EmbedType::Inline => BlockType::RawHtml(render_target(&s)),
                EmbedType::SvgFile => match self.persist_svg(&s) {
                    Ok(imgfile) => BlockType::Image(imgfile),
                    Err(e) => {
                        log::error!("could not write SVG image: {e}");
                        BlockType::RawHtml(render_target(&s))
                    }
                },
            },
        }
    }

    /// Write to a temporary image file which outlives this process
    fn persist_svg(&self, svg: &str) -> std::io::Result<PathBuf> {
        let mut tmpfile = Builder::new()
            .prefix("tmp-tikz-")
            .suffix(".svg")
            // must persist - pandoc will need it beyond our lifetime
            .disable_cleanup(true)
            .tempfile_in(self.compiler.settings().image_root())?;
        tmpfile.write_all(svg.as_bytes())?;
        let imgfile = PathBuf::from(tmpfile.path());
        drop(tmpfile); // close file to flush
        Ok(imgfile)
    }
}

impl PandocPlugin for TikzPlugin {
    /// Extract content of `tikz`-fenced code blocks
    fn select_object(&self, object: &Map<String, Value>) -> Option<String> {
        codeblock_content(object, "tikz")
    }

    fn generate_blocks(&self, contents: Vec<String>) -> Vec<BlockType> {
        log::info!(
            "rendering {} tikz block(s) with up to {} job(s)",
            contents.len(),
            self.pool.jobs()
        );
        self.pool.run(contents, |content| self.generate_block(&content))
    }
}
