pub mod handler;
mod middleware;
mod public;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::Key;

use crate::application::error::ErrorReport;
use crate::application::render::MarkdownRenderer;
use crate::application::repos::{HealthRepo, MembersRepo, RepoError, SessionFactory};
use crate::config::SiteSettings;

pub use handler::{BaseHandler, Chunk, RenderContext, RequestHandler, TemplateHelpers};
pub use middleware::{
    FinalizeOutcome, METRIC_DB_SESSION_FINALIZE, RequestContext, RequestSession,
    finalize_session, finish_request, log_responses, set_request_context,
};
pub use public::build_router;

/// Shared services handed to every request.
#[derive(Clone)]
pub struct HttpState {
    pub members: Arc<dyn MembersRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub sessions: Arc<dyn SessionFactory>,
    pub renderer: MarkdownRenderer,
    pub site: Arc<SiteSettings>,
    pub cookie_key: Key,
    pub trust_forwarded_headers: bool,
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
