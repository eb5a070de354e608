//! Untrusted text to HTML.
//!
//! User input is escaped, fenced code blocks are replaced with inline-styled
//! highlighter output, and the result goes through CommonMark rendering.
//! [`MarkdownRenderer`] memoises the whole pipeline by content hash.

mod escape;
mod highlight;
mod markdown;
mod safe_html;
mod types;

pub use escape::{escape_html, unescape_html};
pub use highlight::available_themes;
pub use markdown::{METRIC_MARKDOWN_RENDER_MS, MarkdownRenderer, RENDERER_REVISION, cache_key};
pub use safe_html::{SafeHtmlRenderer, safe_html};
pub use types::{RenderError, RenderPipelineConfig};
