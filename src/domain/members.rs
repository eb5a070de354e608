//! Members and the session value carried in the `user` cookie.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;
use time::OffsetDateTime;

use super::error::DomainError;

/// Role value at or above which a member counts as staff.
pub const STAFF_ROLE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub role: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MemberRecord {
    pub fn is_staff(&self) -> bool {
        self.role >= STAFF_ROLE
    }
}

/// Anything that records which member owns it.
///
/// Models without an owner return `None`, which never matches a member.
pub trait Owned {
    fn owner_id(&self) -> Option<i64>;
}

impl Owned for MemberRecord {
    fn owner_id(&self) -> Option<i64> {
        Some(self.id)
    }
}

/// Parsed `"<id>/<token>"` payload of the signed `user` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub member_id: i64,
    pub token: String,
}

impl SessionCookie {
    pub fn for_member(member: &MemberRecord) -> Self {
        Self {
            member_id: member.id,
            token: member.token.clone(),
        }
    }
}

impl FromStr for SessionCookie {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('/');
        let (Some(id), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::validation(
                "session cookie must have the form `<id>/<token>`",
            ));
        };

        let member_id = id
            .parse::<i64>()
            .map_err(|err| DomainError::validation(format!("invalid member id `{id}`: {err}")))?;

        Ok(Self {
            member_id,
            token: token.to_string(),
        })
    }
}

impl Display for SessionCookie {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.member_id, self.token)
    }
}
