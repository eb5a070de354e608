//! Resolving the signed-in member from the `user` cookie.

use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::application::repos::MembersRepo;
use crate::domain::members::{MemberRecord, SessionCookie};

pub const USER_COOKIE: &str = "user";

/// Look up the member named by the signed `user` cookie.
///
/// Malformed payloads, unknown members and token mismatches clear the cookie.
/// A repository failure leaves the cookie in place so a transient outage does
/// not sign everyone out.
pub async fn resolve_current_user(
    jar: SignedCookieJar,
    members: &dyn MembersRepo,
) -> (SignedCookieJar, Option<MemberRecord>) {
    let Some(cookie) = jar.get(USER_COOKIE) else {
        return (jar, None);
    };

    let session = match cookie.value().parse::<SessionCookie>() {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "discarding malformed user cookie");
            return (clear_current_user(jar), None);
        }
    };

    let member = match members.find_member(session.member_id).await {
        Ok(Some(member)) => member,
        Ok(None) => {
            debug!(member_id = session.member_id, "user cookie names unknown member");
            return (clear_current_user(jar), None);
        }
        Err(err) => {
            warn!(
                member_id = session.member_id,
                error = %err,
                "member lookup failed, treating request as anonymous"
            );
            return (jar, None);
        }
    };

    if !tokens_match(&member.token, &session.token) {
        debug!(member_id = member.id, "user cookie token mismatch");
        return (clear_current_user(jar), None);
    }

    (jar, Some(member))
}

/// Sign `member` in by writing the `user` cookie.
pub fn set_current_user(jar: SignedCookieJar, member: &MemberRecord) -> SignedCookieJar {
    let value = SessionCookie::for_member(member).to_string();
    jar.add(
        Cookie::build((USER_COOKIE, value))
            .path("/")
            .http_only(true),
    )
}

pub fn clear_current_user(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(USER_COOKIE).path("/"))
}

fn tokens_match(stored: &str, presented: &str) -> bool {
    hash_token(stored).ct_eq(&hash_token(presented)).unwrap_u8() == 1
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum_extra::extract::cookie::Key;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::repos::RepoError;

    struct StubMembers {
        member: Option<MemberRecord>,
        fail: bool,
        calls: Mutex<Vec<i64>>,
    }

    impl StubMembers {
        fn with(member: Option<MemberRecord>) -> Self {
            Self {
                member,
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                member: None,
                fail: true,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MembersRepo for StubMembers {
        async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError> {
            self.calls.lock().expect("calls lock").push(id);
            if self.fail {
                return Err(RepoError::Timeout);
            }
            Ok(self.member.clone().filter(|member| member.id == id))
        }
    }

    fn member(id: i64, token: &str) -> MemberRecord {
        MemberRecord {
            id,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            token: token.to_string(),
            role: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn jar_with(value: &str) -> SignedCookieJar {
        SignedCookieJar::new(Key::generate()).add(Cookie::new(USER_COOKIE, value.to_string()))
    }

    #[tokio::test]
    async fn missing_cookie_is_anonymous_without_lookup() {
        let repo = StubMembers::with(Some(member(5, "abcdef")));
        let (_, user) = resolve_current_user(SignedCookieJar::new(Key::generate()), &repo).await;
        assert!(user.is_none());
        assert!(repo.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn matching_token_resolves_member() {
        let repo = StubMembers::with(Some(member(5, "abcdef")));
        let (jar, user) = resolve_current_user(jar_with("5/abcdef"), &repo).await;
        assert_eq!(user.map(|m| m.id), Some(5));
        assert!(jar.get(USER_COOKIE).is_some());
    }

    #[tokio::test]
    async fn wrong_token_clears_cookie() {
        let repo = StubMembers::with(Some(member(5, "abcdef")));
        let (jar, user) = resolve_current_user(jar_with("5/wrong"), &repo).await;
        assert!(user.is_none());
        assert!(jar.get(USER_COOKIE).is_none());
    }

    #[tokio::test]
    async fn malformed_cookie_clears_without_lookup() {
        let repo = StubMembers::with(Some(member(5, "abcdef")));
        for value in ["garbage", "x/abcdef", "5/abc/def"] {
            let (jar, user) = resolve_current_user(jar_with(value), &repo).await;
            assert!(user.is_none(), "{value}");
            assert!(jar.get(USER_COOKIE).is_none(), "{value}");
        }
        assert!(repo.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn unknown_member_clears_cookie() {
        let repo = StubMembers::with(None);
        let (jar, user) = resolve_current_user(jar_with("9/abcdef"), &repo).await;
        assert!(user.is_none());
        assert!(jar.get(USER_COOKIE).is_none());
    }

    #[tokio::test]
    async fn repository_failure_keeps_cookie() {
        let repo = StubMembers::failing();
        let (jar, user) = resolve_current_user(jar_with("5/abcdef"), &repo).await;
        assert!(user.is_none());
        assert!(jar.get(USER_COOKIE).is_some());
    }

    #[test]
    fn set_current_user_writes_id_and_token() {
        let jar = set_current_user(SignedCookieJar::new(Key::generate()), &member(7, "tok"));
        let cookie = jar.get(USER_COOKIE).expect("cookie");
        assert_eq!(cookie.value(), "7/tok");
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match("abcdef", "abcdef"));
        assert!(!tokens_match("abcdef", "abcdeg"));
        assert!(!tokens_match("abcdef", ""));
    }
}
