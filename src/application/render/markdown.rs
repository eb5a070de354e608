use std::sync::Arc;
use std::time::Instant;

use md5::{Digest, Md5};
use metrics::histogram;
use tracing::trace;

use crate::cache::HtmlCache;

use super::safe_html::SafeHtmlRenderer;

/// Bumped whenever rendering output changes for identical input, so stale
/// fragments from a previous build can never be served.
pub const RENDERER_REVISION: u32 = 1;

pub const METRIC_MARKDOWN_RENDER_MS: &str = "june_markdown_render_ms";

/// Cache key for `content`: `html:` followed by 32 lowercase hex digits.
pub fn cache_key(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(RENDERER_REVISION.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    format!("html:{}", hex::encode(hasher.finalize()))
}

/// [`SafeHtmlRenderer`] memoised through an [`HtmlCache`].
#[derive(Clone)]
pub struct MarkdownRenderer {
    renderer: Arc<SafeHtmlRenderer>,
    cache: Arc<dyn HtmlCache>,
}

impl MarkdownRenderer {
    pub fn new(renderer: Arc<SafeHtmlRenderer>, cache: Arc<dyn HtmlCache>) -> Self {
        Self { renderer, cache }
    }

    /// Render `content`, consulting the cache first.
    ///
    /// Concurrent misses for the same key may both render; the values are
    /// identical so the second store is harmless.
    pub fn markdown(&self, content: &str) -> String {
        let key = cache_key(content);
        if let Some(html) = self.cache.get(&key) {
            trace!(key = %key, "markdown cache hit");
            return html;
        }

        let started = Instant::now();
        let html = self.renderer.render(content);
        histogram!(METRIC_MARKDOWN_RENDER_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        self.cache.set(key, html.clone());
        html
    }
}
