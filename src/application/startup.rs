use tracing::info;

use crate::config::Settings;

/// Log the identity of the process once logging is installed.
pub fn announce(settings: &Settings) {
    info!(
        target = "june::startup",
        sitename = %settings.site.sitename,
        version = %settings.site.version,
        debug = settings.site.debug,
        addr = %settings.server.addr,
        cache_enabled = settings.cache.enabled,
        theme = %settings.render.theme,
        "starting June"
    );
}
