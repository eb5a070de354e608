use once_cell::sync::Lazy;
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::{SyntaxReference, SyntaxSet},
};
use tracing::warn;

use super::escape::escape_html;
use super::types::RenderError;

pub(crate) const DEFAULT_THEME: &str = "InspiredGitHub";
pub(crate) const PLAIN_TEXT: &str = "text";

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Names of the themes bundled with the highlighter.
pub fn available_themes() -> impl Iterator<Item = &'static str> {
    THEME_SET.themes.keys().map(String::as_str)
}

pub(crate) struct HighlightedBlock {
    /// Tag reported in `data-syntax`: the fence tag when it resolved, otherwise `text`.
    pub language: String,
    pub html: String,
}

/// Inline-styled syntax highlighter.
pub(crate) struct Highlighter {
    syntax_set: &'static SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    pub(crate) fn new(theme_name: &str) -> Result<Self, RenderError> {
        let theme = THEME_SET
            .themes
            .get(theme_name)
            .cloned()
            .ok_or_else(|| RenderError::UnknownTheme {
                theme: theme_name.to_string(),
            })?;

        Ok(Self {
            syntax_set: &SYNTAX_SET,
            theme,
        })
    }

    pub(crate) fn highlight(&self, tag: &str, code: &str) -> HighlightedBlock {
        let (language, syntax) = match find_syntax(self.syntax_set, tag) {
            Some(syntax) => (tag.to_string(), syntax),
            None => (
                PLAIN_TEXT.to_string(),
                self.syntax_set.find_syntax_plain_text(),
            ),
        };

        let html = match highlighted_html_for_string(code, self.syntax_set, syntax, &self.theme) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "june::render::highlight",
                    language = %language,
                    error = %err,
                    "highlighting failed, emitting plain text"
                );
                format!("<pre>{}</pre>", escape_html(code))
            }
        };

        HighlightedBlock { language, html }
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self {
            syntax_set: &SYNTAX_SET,
            theme: THEME_SET
                .themes
                .get(DEFAULT_THEME)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    if token.is_empty() {
        return None;
    }
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}
