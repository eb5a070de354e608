use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;

use crate::application::render::MarkdownRenderer;
use crate::config::SiteSettings;

/// The `msg` cookie value seen on the incoming request.
///
/// Shared between the handler and the template context so that reading it
/// from either side consumes it for both.
#[derive(Debug, Default)]
pub(crate) struct FlashSlot {
    message: Option<String>,
    consumed: AtomicBool,
}

impl FlashSlot {
    pub(crate) fn new(message: Option<String>) -> Self {
        Self {
            message,
            consumed: AtomicBool::new(false),
        }
    }

    pub(crate) fn take(&self) -> Option<String> {
        let message = self.message.as_ref()?;
        if self.consumed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(message.clone())
    }

    pub(crate) fn consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}

/// Per-request values available to every template as `context`.
#[derive(Clone)]
pub struct RenderContext {
    pub now: OffsetDateTime,
    pub sitename: String,
    pub version: String,
    pub debug: bool,
    pub ga: Option<String>,
    flash: Arc<FlashSlot>,
}

impl RenderContext {
    pub(crate) fn new(site: &SiteSettings, flash: Arc<FlashSlot>) -> Self {
        Self {
            now: OffsetDateTime::now_utc(),
            sitename: site.sitename.clone(),
            version: site.version.clone(),
            debug: site.debug,
            ga: site.ga.clone(),
            flash,
        }
    }

    /// Flash message from the previous request; `None` after the first read.
    pub fn get_msg(&self) -> Option<String> {
        self.flash.take()
    }
}

/// Filters available to every template as `helpers`.
#[derive(Clone)]
pub struct TemplateHelpers {
    renderer: MarkdownRenderer,
}

impl TemplateHelpers {
    pub fn new(renderer: MarkdownRenderer) -> Self {
        Self { renderer }
    }

    pub fn markdown(&self, content: impl AsRef<str>) -> String {
        self.renderer.markdown(content.as_ref())
    }
}
