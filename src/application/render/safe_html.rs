use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::{Options, markdown_to_html};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::escape::{escape_html, unescape_html};
use super::highlight::Highlighter;
use super::types::{RenderError, RenderPipelineConfig};

/// Triple-backtick block with an optional word tag, matched across newlines.
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w*)(.+?)```").expect("fence pattern must compile"));

static DEFAULT_RENDERER: Lazy<SafeHtmlRenderer> = Lazy::new(SafeHtmlRenderer::default);

/// Render untrusted text with the default theme.
pub fn safe_html(text: &str) -> String {
    DEFAULT_RENDERER.render(text)
}

/// Turns untrusted user text into HTML.
///
/// The input is entity-escaped before anything else, so the only raw markup
/// reaching the markdown stage is the highlighter output spliced in for
/// fenced code blocks. Markdown itself can still produce links and images, so
/// the rendered HTML goes through an allowlist sanitizer last.
pub struct SafeHtmlRenderer {
    highlighter: Highlighter,
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl SafeHtmlRenderer {
    pub fn new(config: &RenderPipelineConfig) -> Result<Self, RenderError> {
        Ok(Self {
            highlighter: Highlighter::new(&config.theme)?,
            options: markdown_options(),
            sanitizer: build_sanitizer(),
        })
    }

    pub fn render(&self, text: &str) -> String {
        let escaped = escape_html(text);
        let spliced = FENCE.replace_all(&escaped, |caps: &Captures<'_>| {
            self.code_block(&caps[1], &caps[2])
        });
        let html = markdown_to_html(&spliced, &self.options);
        self.sanitizer.clean(&html).to_string()
    }

    fn code_block(&self, tag: &str, escaped_code: &str) -> String {
        let code = unescape_html(escaped_code);
        let block = self.highlighter.highlight(tag, &code);
        // Keep the block on one line so markdown treats it as a single raw HTML block.
        let html = block
            .html
            .replace("\n\n", "\n&nbsp;\n")
            .replace('\n', "<br />");
        format!(
            "\n\n<div class=\"code\" data-syntax=\"{}\">{}</div>\n\n",
            block.language, html
        )
    }
}

impl Default for SafeHtmlRenderer {
    fn default() -> Self {
        Self {
            highlighter: Highlighter::default(),
            options: markdown_options(),
            sanitizer: build_sanitizer(),
        }
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    options.render.r#unsafe = true;
    options
}

/// Markdown output plus the inline-styled highlight fragments; links only to
/// web and mail targets.
fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.add_tag_attributes("div", &["class", "data-syntax"]);
    builder.add_tag_attributes("pre", &["style"]);
    builder.add_tag_attributes("span", &["style"]);
    builder.url_schemes(HashSet::from(["http", "https", "mailto"]));
    builder
}
