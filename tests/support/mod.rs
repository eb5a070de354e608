#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::to_bytes,
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use june::application::render::{MarkdownRenderer, SafeHtmlRenderer};
use june::application::repos::{HealthRepo, MembersRepo, RepoError, SessionFactory, UnitOfWork};
use june::cache::{CacheConfig, HtmlCache, LruHtmlCache};
use june::config::SiteSettings;
use june::domain::members::MemberRecord;
use june::infra::http::HttpState;
use time::OffsetDateTime;

pub fn member(id: i64, username: &str, token: &str) -> MemberRecord {
    MemberRecord {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        token: token.to_string(),
        role: 0,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[derive(Default)]
pub struct InMemoryMembers {
    members: HashMap<i64, MemberRecord>,
}

#[async_trait]
impl MembersRepo for InMemoryMembers {
    async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError> {
        Ok(self.members.get(&id).cloned())
    }
}

pub struct StaticHealth {
    pub healthy: bool,
}

#[async_trait]
impl HealthRepo for StaticHealth {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

/// Unit of work that records calls; the first `commit_failures` commits fail.
pub struct RecordingSession {
    commit_failures: AtomicUsize,
    members: Arc<InMemoryMembers>,
    events: Mutex<Vec<&'static str>>,
}

impl RecordingSession {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().expect("events lock").clone()
    }
}

#[async_trait]
impl UnitOfWork for RecordingSession {
    async fn commit(&self) -> Result<(), RepoError> {
        self.events.lock().expect("events lock").push("commit");
        let failing = self
            .commit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(RepoError::from_persistence("commit refused"))
        } else {
            Ok(())
        }
    }

    async fn rollback(&self) -> Result<(), RepoError> {
        self.events.lock().expect("events lock").push("rollback");
        Ok(())
    }

    fn members(&self) -> &dyn MembersRepo {
        self
    }
}

#[async_trait]
impl MembersRepo for RecordingSession {
    async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError> {
        self.events.lock().expect("events lock").push("find_member");
        self.members.find_member(id).await
    }
}

#[derive(Default)]
pub struct RecordingSessions {
    commit_failures: usize,
    members: Arc<InMemoryMembers>,
    opened: Mutex<Vec<Arc<RecordingSession>>>,
}

impl RecordingSessions {
    pub fn with_commit_failures(commit_failures: usize) -> Self {
        Self {
            commit_failures,
            ..Default::default()
        }
    }

    pub fn with_members(mut self, members: Arc<InMemoryMembers>) -> Self {
        self.members = members;
        self
    }

    pub fn opened(&self) -> Vec<Arc<RecordingSession>> {
        self.opened.lock().expect("opened lock").clone()
    }
}

impl SessionFactory for RecordingSessions {
    fn open(&self) -> Arc<dyn UnitOfWork> {
        let session = Arc::new(RecordingSession {
            commit_failures: AtomicUsize::new(self.commit_failures),
            members: self.members.clone(),
            events: Mutex::new(Vec::new()),
        });
        self.opened
            .lock()
            .expect("opened lock")
            .push(session.clone());
        session
    }
}

/// LRU cache that counts traffic.
pub struct CountingCache {
    inner: LruHtmlCache,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl Default for CountingCache {
    fn default() -> Self {
        Self {
            inner: LruHtmlCache::new(&CacheConfig::default()),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }
}

impl HtmlCache for CountingCache {
    fn get(&self, key: &str) -> Option<String> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: String, html: String) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, html);
    }
}

pub struct Harness {
    pub state: HttpState,
    pub sessions: Arc<RecordingSessions>,
    pub cache: Arc<CountingCache>,
    pub key: Key,
}

pub struct HarnessBuilder {
    members: Vec<MemberRecord>,
    healthy: bool,
    commit_failures: usize,
    intro: Option<String>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            healthy: true,
            commit_failures: 0,
            intro: None,
        }
    }
}

impl HarnessBuilder {
    pub fn member(mut self, member: MemberRecord) -> Self {
        self.members.push(member);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn commit_failures(mut self, count: usize) -> Self {
        self.commit_failures = count;
        self
    }

    pub fn intro(mut self, intro: &str) -> Self {
        self.intro = Some(intro.to_string());
        self
    }

    pub fn build(self) -> Harness {
        let key = Key::from(&[7_u8; 64][..]);
        let members = Arc::new(InMemoryMembers {
            members: self
                .members
                .into_iter()
                .map(|member| (member.id, member))
                .collect(),
        });
        let sessions = Arc::new(
            RecordingSessions::with_commit_failures(self.commit_failures)
                .with_members(members.clone()),
        );
        let cache = Arc::new(CountingCache::default());

        let state = HttpState {
            members,
            health: Arc::new(StaticHealth {
                healthy: self.healthy,
            }),
            sessions: sessions.clone(),
            renderer: MarkdownRenderer::new(Arc::new(SafeHtmlRenderer::default()), cache.clone()),
            site: Arc::new(SiteSettings {
                sitename: "June Test".to_string(),
                version: "9.9.9".to_string(),
                debug: false,
                ga: None,
                intro: self.intro,
            }),
            cookie_key: key.clone(),
            trust_forwarded_headers: false,
        };

        Harness {
            state,
            sessions,
            cache,
            key,
        }
    }
}

/// `Cookie` header value carrying a signed `user` cookie.
pub fn signed_user_cookie(key: &Key, value: &str) -> String {
    let jar = SignedCookieJar::new(key.clone()).add(Cookie::new("user", value.to_string()));
    let response = jar.into_response();
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("signed cookie header")
        .to_str()
        .expect("ascii cookie");
    header
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
