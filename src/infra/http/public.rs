use std::collections::HashMap;

use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::Response,
    routing::get,
};
use serde_json::json;

use crate::application::error::ErrorReport;
use crate::presentation::views::{ErrorTemplate, IndexTemplate};

use super::{
    HttpState, db_health_response,
    handler::{BaseHandler, RequestHandler},
    middleware::{finish_request, log_responses, set_request_context},
};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/preview", get(preview).post(preview_form))
        .route("/account", get(account))
        .route("/signout", get(signout))
        .route("/_health/db", get(db_health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), finish_request))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(mut handler: BaseHandler) -> Response {
    let page = IndexTemplate {
        context: handler.context().clone(),
        helpers: handler.helpers().clone(),
        member: handler.current_user().cloned(),
        intro: handler.state().site.intro.clone(),
        mobile: handler.is_mobile(),
    };
    handler.render(page);
    handler.finish()
}

async fn preview(mut handler: BaseHandler) -> Response {
    let content = handler.get_argument("content").unwrap_or_default().to_string();
    let html = handler.markdown(&content);
    handler.write(json!({ "html": html }));
    handler.finish()
}

async fn preview_form(
    mut handler: BaseHandler,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    handler.extend_arguments(form);
    preview(handler).await
}

async fn account(mut handler: BaseHandler) -> Response {
    let member = handler
        .current_user()
        .map(serde_json::to_value)
        .transpose();

    match member {
        Ok(Some(member)) => {
            handler.write(member);
            handler.finish()
        }
        Ok(None) => {
            handler.set_status(StatusCode::FORBIDDEN);
            handler.write(json!({ "error": "unauthorized" }));
            let mut response = handler.finish();
            ErrorReport::from_message(
                "infra::http::public::account",
                StatusCode::FORBIDDEN,
                "account requested without a signed-in member",
            )
            .attach(&mut response);
            response
        }
        Err(err) => {
            handler.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            handler.write(json!({ "error": "internal" }));
            let mut response = handler.finish();
            ErrorReport::from_error(
                "infra::http::public::account",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn signout(mut handler: BaseHandler) -> Response {
    handler.clear_current_user();
    handler.set_msg("Signed out");
    let next = handler.next_url();
    handler.redirect(&next);
    handler.finish()
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn not_found(mut handler: BaseHandler) -> Response {
    let page = ErrorTemplate {
        context: handler.context().clone(),
        helpers: handler.helpers().clone(),
        status: StatusCode::NOT_FOUND.as_u16(),
        title: "Not Found".to_string(),
        message: "The page you requested does not exist.".to_string(),
    };
    handler.set_status(StatusCode::NOT_FOUND);
    handler.render(page);
    let mut response = handler.finish();
    ErrorReport::from_message(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}
