use thiserror::Error;

use super::highlight::DEFAULT_THEME;

/// Failures surfaced while building the rendering pipeline.
///
/// Rendering itself never fails: highlighter errors degrade to escaped plain
/// text and comrak accepts any input.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown highlight theme `{theme}`")]
    UnknownTheme { theme: String },
}

#[derive(Debug, Clone)]
pub struct RenderPipelineConfig {
    /// Name of a bundled syntect theme used for inline styles.
    pub theme: String,
}

impl Default for RenderPipelineConfig {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl From<&crate::config::RenderSettings> for RenderPipelineConfig {
    fn from(settings: &crate::config::RenderSettings) -> Self {
        Self {
            theme: settings.theme.clone(),
        }
    }
}
