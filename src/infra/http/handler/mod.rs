//! Per-request handler base: identity, arguments, output and cookies.
//!
//! Route functions take a [`BaseHandler`] as an extractor, drive it through
//! `write` / `render` / `redirect`, and return `finish()`.

mod classify;
mod context;
mod write;

use std::{
    collections::HashMap,
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use askama::Template;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SignedCookieJar};
use time::Duration;
use tracing::warn;

use crate::application::{
    error::HttpError,
    members::{clear_current_user, resolve_current_user, set_current_user},
    repos::UnitOfWork,
};
use crate::domain::members::{MemberRecord, Owned};
use crate::presentation::views::render_template;

use super::HttpState;
use super::middleware::RequestSession;

pub use classify::DEFAULT_USER_AGENT;
pub use context::{RenderContext, TemplateHelpers};
pub use write::{
    Chunk, HTML_CONTENT_TYPE, JAVASCRIPT_CONTENT_TYPE, JSON_CONTENT_TYPE, encode_json,
    is_valid_callback,
};

use context::FlashSlot;
use write::ResponseBuffer;

pub const MSG_COOKIE: &str = "msg";
const MSG_LIFETIME: Duration = Duration::seconds(10);

/// Lifecycle every request handler goes through.
#[async_trait]
pub trait RequestHandler: Sized + Send {
    type State: Send + Sync;

    /// Build the handler from the request head, resolving identity and context.
    async fn prepare(parts: &mut Parts, state: &Self::State) -> Self;

    fn write(&mut self, chunk: impl Into<Chunk> + Send);

    /// Produce the response, applying any cookie changes.
    fn finish(self) -> Response;
}

pub struct BaseHandler {
    state: HttpState,
    headers: HeaderMap,
    remote_ip: Option<IpAddr>,
    arguments: HashMap<String, String>,
    signed: SignedCookieJar,
    plain: CookieJar,
    current_user: Option<MemberRecord>,
    flash: Arc<FlashSlot>,
    msg_set: bool,
    context: RenderContext,
    helpers: TemplateHelpers,
    session: Option<Arc<dyn UnitOfWork>>,
    buffer: ResponseBuffer,
    failure: Option<HttpError>,
}

#[async_trait]
impl RequestHandler for BaseHandler {
    type State = HttpState;

    async fn prepare(parts: &mut Parts, state: &HttpState) -> Self {
        let headers = parts.headers.clone();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let remote_ip = classify::remote_ip(peer, &headers, state.trust_forwarded_headers);
        let arguments = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(arguments)| arguments)
            .unwrap_or_default();
        let session = parts
            .extensions
            .get::<RequestSession>()
            .map(|RequestSession(session)| session.clone());

        let signed = SignedCookieJar::from_headers(&headers, state.cookie_key.clone());
        let members = match session.as_ref() {
            Some(session) => session.members(),
            None => state.members.as_ref(),
        };
        let (signed, current_user) = resolve_current_user(signed, members).await;

        let plain = CookieJar::from_headers(&headers);
        let flash = Arc::new(FlashSlot::new(
            plain
                .get(MSG_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|message| !message.is_empty()),
        ));
        let context = RenderContext::new(&state.site, flash.clone());
        let helpers = TemplateHelpers::new(state.renderer.clone());

        Self {
            state: state.clone(),
            headers,
            remote_ip,
            arguments,
            signed,
            plain,
            current_user,
            flash,
            msg_set: false,
            context,
            helpers,
            session,
            buffer: ResponseBuffer::default(),
            failure: None,
        }
    }

    /// Append `chunk` to the body; mappings honour a valid `callback` argument.
    fn write(&mut self, chunk: impl Into<Chunk> + Send) {
        let callback = self
            .get_argument("callback")
            .filter(|name| !name.is_empty())
            .and_then(|name| {
                if is_valid_callback(name) {
                    Some(name.to_string())
                } else {
                    warn!(callback = name, "ignoring invalid JSONP callback");
                    None
                }
            });
        self.buffer.write(chunk.into(), callback.as_deref());
    }

    fn finish(self) -> Response {
        // A message queued by this request outlives the one it consumed.
        let plain = if self.flash.consumed() && !self.msg_set {
            self.plain.remove(Cookie::build(MSG_COOKIE).path("/"))
        } else {
            self.plain
        };

        match self.failure {
            Some(err) => (self.signed, plain, err).into_response(),
            None => (self.signed, plain, self.buffer.into_response()).into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for BaseHandler
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        Ok(<Self as RequestHandler>::prepare(parts, &state).await)
    }
}

impl BaseHandler {
    pub fn state(&self) -> &HttpState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&MemberRecord> {
        self.current_user.as_ref()
    }

    pub fn set_current_user(&mut self, member: MemberRecord) {
        self.signed = set_current_user(self.signed.clone(), &member);
        self.current_user = Some(member);
    }

    pub fn clear_current_user(&mut self) {
        self.signed = clear_current_user(self.signed.clone());
        self.current_user = None;
    }

    /// Request-scoped database session, when the finalization layer is installed.
    pub fn session(&self) -> Option<&Arc<dyn UnitOfWork>> {
        self.session.as_ref()
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn helpers(&self) -> &TemplateHelpers {
        &self.helpers
    }

    pub fn get_argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(String::as_str)
    }

    /// Merge body arguments; they take precedence over the query string.
    pub fn extend_arguments(&mut self, arguments: HashMap<String, String>) {
        self.arguments.extend(arguments);
    }

    pub fn status(&self) -> StatusCode {
        self.buffer.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.buffer.set_status(status);
    }

    pub fn set_header(&mut self, name: axum::http::HeaderName, value: HeaderValue) {
        self.buffer.headers_mut().insert(name, value);
    }

    /// Render `template` into the body. Failures turn the response into a 500.
    pub fn render<T: Template>(&mut self, template: T) {
        match render_template(template) {
            Ok(html) => self.write(html.0),
            Err(err) => self.failure = Some(err),
        }
    }

    pub fn redirect(&mut self, url: &str) {
        let location = HeaderValue::from_str(url).unwrap_or_else(|_| {
            warn!(url, "redirect target is not a valid header value");
            HeaderValue::from_static("/")
        });
        self.buffer.set_status(StatusCode::FOUND);
        self.buffer.headers_mut().insert(LOCATION, location);
    }

    /// Queue a flash message for the next request.
    pub fn set_msg(&mut self, msg: impl Into<String>) -> String {
        let msg = msg.into();
        let cookie = Cookie::build((MSG_COOKIE, msg.clone()))
            .path("/")
            .expires(time::OffsetDateTime::now_utc() + MSG_LIFETIME);
        self.plain = self.plain.clone().add(cookie);
        self.msg_set = true;
        msg
    }

    /// Flash message carried by this request; cleared once read.
    pub fn get_msg(&self) -> Option<String> {
        self.flash.take()
    }

    pub fn user_agent(&self) -> &str {
        classify::user_agent(&self.headers)
    }

    pub fn is_mobile(&self) -> bool {
        classify::is_mobile(self.user_agent())
    }

    pub fn is_spider(&self) -> bool {
        classify::is_spider(self.user_agent())
    }

    pub fn is_ajax(&self) -> bool {
        classify::is_ajax(&self.headers)
    }

    pub fn is_system(&self) -> bool {
        classify::is_system(self.remote_ip)
    }

    pub fn is_owner_of(&self, model: &impl Owned) -> bool {
        match (model.owner_id(), self.current_user.as_ref()) {
            (Some(owner), Some(member)) => owner == member.id,
            _ => false,
        }
    }

    pub fn next_url(&self) -> String {
        self.get_argument("next")
            .filter(|next| !next.is_empty())
            .unwrap_or("/")
            .to_string()
    }

    pub fn markdown(&self, content: &str) -> String {
        self.state.renderer.markdown(content)
    }
}
