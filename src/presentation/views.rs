use askama::{Error as AskamaError, Template};
use axum::{http::StatusCode, response::Html};
use thiserror::Error;

use crate::application::error::HttpError;
use crate::domain::members::MemberRecord;
use crate::infra::http::{RenderContext, TemplateHelpers};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

/// Site front page.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub context: RenderContext,
    pub helpers: TemplateHelpers,
    pub member: Option<MemberRecord>,
    /// Markdown shown above the fold, rendered through `helpers.markdown`.
    pub intro: Option<String>,
    pub mobile: bool,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub context: RenderContext,
    pub helpers: TemplateHelpers,
    pub status: u16,
    pub title: String,
    pub message: String,
}
