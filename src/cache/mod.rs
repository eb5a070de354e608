//! Rendered-HTML cache.
//!
//! Markdown rendering is memoised under a content-hash key. The backend owns
//! the eviction policy; nothing else invalidates entries.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! ```

mod config;
mod lock;
mod store;

pub use config::CacheConfig;
pub use store::{
    DisabledHtmlCache, HtmlCache, LruHtmlCache, METRIC_MARKDOWN_CACHE_EVICT,
    METRIC_MARKDOWN_CACHE_HIT, METRIC_MARKDOWN_CACHE_MISS, build_html_cache,
};
