use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{MembersRepo, RepoError};
use crate::domain::members::MemberRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: i64,
    username: String,
    email: String,
    token: String,
    role: i32,
    created_at: OffsetDateTime,
}

impl From<MemberRow> for MemberRecord {
    fn from(row: MemberRow) -> Self {
        MemberRecord {
            id: row.id,
            username: row.username,
            email: row.email,
            token: row.token,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

const FIND_MEMBER_SQL: &str = r#"
    SELECT id, username, email, token, role, created_at
    FROM members
    WHERE id = $1
"#;

pub(super) async fn find_member<'c, E>(
    executor: E,
    id: i64,
) -> Result<Option<MemberRecord>, RepoError>
where
    E: sqlx::PgExecutor<'c>,
{
    let row = sqlx::query_as::<_, MemberRow>(FIND_MEMBER_SQL)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;

    Ok(row.map(MemberRecord::from))
}

/// Pool-level lookup, for callers outside a request session.
#[async_trait]
impl MembersRepo for PostgresRepositories {
    async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError> {
        find_member(self.pool(), id).await
    }
}
