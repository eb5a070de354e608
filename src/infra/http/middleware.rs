use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{error::ErrorReport, repos::UnitOfWork};

use super::HttpState;

pub const METRIC_DB_SESSION_FINALIZE: &str = "june_db_session_finalize_total";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Database session shared by everything handling one request.
#[derive(Clone)]
pub struct RequestSession(pub Arc<dyn UnitOfWork>);

/// How a session was left after a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Committed,
    RolledBack,
    Failed,
}

impl FinalizeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "june::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "june::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Give every request a session and settle it when the response is a 500.
///
/// The response itself is never altered.
pub async fn finish_request(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = state.sessions.open();
    request
        .extensions_mut()
        .insert(RequestSession(session.clone()));

    let response = next.run(request).await;
    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        finalize_session(session.as_ref()).await;
    }
    response
}

/// Commit; on failure roll back. A last commit is attempted either way.
pub async fn finalize_session(session: &dyn UnitOfWork) -> FinalizeOutcome {
    let outcome = match session.commit().await {
        Ok(()) => FinalizeOutcome::Committed,
        Err(commit_err) => {
            warn!(
                target = "june::http::finish",
                error = %commit_err,
                "commit after failed request did not succeed, rolling back"
            );
            match session.rollback().await {
                Ok(()) => FinalizeOutcome::RolledBack,
                Err(rollback_err) => {
                    error!(
                        target = "june::http::finish",
                        error = %rollback_err,
                        "rollback after failed request did not succeed"
                    );
                    FinalizeOutcome::Failed
                }
            }
        }
    };

    if let Err(err) = session.commit().await {
        error!(
            target = "june::http::finish",
            error = %err,
            "final commit after failed request did not succeed"
        );
    }

    counter!(METRIC_DB_SESSION_FINALIZE, "outcome" => outcome.as_str()).increment(1);
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::{MembersRepo, RepoError};
    use crate::domain::members::MemberRecord;

    #[derive(Default)]
    struct ScriptedSession {
        failing_commits: Mutex<usize>,
        fail_rollback: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedSession {
        fn failing_commits(count: usize) -> Self {
            Self {
                failing_commits: Mutex::new(count),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl UnitOfWork for ScriptedSession {
        async fn commit(&self) -> Result<(), RepoError> {
            self.calls.lock().expect("calls lock").push("commit");
            let mut remaining = self.failing_commits.lock().expect("commit lock");
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RepoError::from_persistence("commit refused"));
            }
            Ok(())
        }

        async fn rollback(&self) -> Result<(), RepoError> {
            self.calls.lock().expect("calls lock").push("rollback");
            if self.fail_rollback {
                return Err(RepoError::Timeout);
            }
            Ok(())
        }

        fn members(&self) -> &dyn MembersRepo {
            self
        }
    }

    #[async_trait]
    impl MembersRepo for ScriptedSession {
        async fn find_member(&self, _id: i64) -> Result<Option<MemberRecord>, RepoError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn successful_commit_is_followed_by_final_commit() {
        let session = ScriptedSession::default();
        let outcome = finalize_session(&session).await;
        assert_eq!(outcome, FinalizeOutcome::Committed);
        assert_eq!(session.calls(), vec!["commit", "commit"]);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_then_commits() {
        let session = ScriptedSession::failing_commits(1);
        let outcome = finalize_session(&session).await;
        assert_eq!(outcome, FinalizeOutcome::RolledBack);
        assert_eq!(session.calls(), vec!["commit", "rollback", "commit"]);
    }

    #[tokio::test]
    async fn everything_failing_still_attempts_final_commit() {
        let session = ScriptedSession {
            failing_commits: Mutex::new(2),
            fail_rollback: true,
            calls: Mutex::new(Vec::new()),
        };
        let outcome = finalize_session(&session).await;
        assert_eq!(outcome, FinalizeOutcome::Failed);
        assert_eq!(session.calls(), vec!["commit", "rollback", "commit"]);
    }
}
